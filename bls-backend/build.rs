//! Bundle the signer service binary.
//!
//! Set `BLS12381SVC_EMBED` to the path of a built `bls12381svc` to embed
//! it. Without it an empty payload is bundled and hosts must supply the
//! binary through `EmbeddedBinary::from_file` or `from_bytes`.

use std::env;
use std::fs;
use std::path::PathBuf;

const EMBED_VAR: &str = "BLS12381SVC_EMBED";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-env-changed={}", EMBED_VAR);

    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    let target = out_dir.join("bls12381svc");

    match env::var_os(EMBED_VAR) {
        Some(source) => {
            let source = PathBuf::from(source);
            println!("cargo:rerun-if-changed={}", source.display());
            fs::copy(&source, &target)?;
        }
        None => fs::write(&target, b"")?,
    }

    Ok(())
}
