//! Signer service binary.
//!
//! This binary runs as a child of the host process and handles signing
//! requests via Unix socket. SIGINT is the normal way to stop it.

use bls_remote_signer::{ServerConfig, SignerServer, DEFAULT_SOCKET_PATH};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// BLS12-381 signer service.
#[derive(Parser, Debug)]
#[command(name = "bls12381svc")]
#[command(about = "Generate keys, sign, aggregate and verify messages using BLS12-381")]
#[command(version)]
struct Args {
    /// Path to Unix socket for client connections
    #[arg(long, env = "BLS12381SVC_SOCKET", default_value = DEFAULT_SOCKET_PATH)]
    socket: PathBuf,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    info!("Starting bls12381svc");
    info!("Socket path: {:?}", args.socket);

    let config = ServerConfig {
        socket_path: args.socket.clone(),
    };

    let server = match SignerServer::new(config) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create server: {}", e);
            std::process::exit(1);
        }
    };

    // Remove the socket and exit on interrupt.
    let socket = args.socket;
    if let Err(e) = ctrlc::set_handler(move || {
        match std::fs::remove_file(&socket) {
            Ok(()) => info!("Removed socket at {:?}", socket),
            Err(e) => error!("Failed to remove socket {:?}: {}", socket, e),
        }
        std::process::exit(0);
    }) {
        error!("Failed to install interrupt handler: {}", e);
        std::process::exit(1);
    }

    info!("Signer service ready, waiting for connections...");

    if let Err(e) = server.run() {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
