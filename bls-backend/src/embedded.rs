// Copyright (C) 2025 Category Labs, Inc.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! The signer service binary carried inside the host program.

use std::borrow::Cow;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::SupervisorError;

/// Payload bundled at build time, empty unless `BLS12381SVC_EMBED` was set.
static BUNDLED: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/bls12381svc"));

/// Outcome of [`EmbeddedBinary::materialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Materialized {
    /// The payload was written to the path.
    Written,
    /// Something already existed at the path and was reused as-is.
    AlreadyPresent,
}

/// An executable payload that can be written to disk and spawned.
#[derive(Clone)]
pub struct EmbeddedBinary {
    payload: Cow<'static, [u8]>,
}

impl EmbeddedBinary {
    /// The payload compiled into this build.
    pub fn bundled() -> Self {
        Self::from_static(BUNDLED)
    }

    pub fn from_static(payload: &'static [u8]) -> Self {
        Self {
            payload: Cow::Borrowed(payload),
        }
    }

    pub fn from_bytes(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: Cow::Owned(payload.into()),
        }
    }

    /// Load the payload from an existing executable.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SupervisorError> {
        let path = path.as_ref();
        let payload = fs::read(path).map_err(|source| SupervisorError::ReadPayload {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_bytes(payload))
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Write the payload to `path` as an owner-only executable.
    ///
    /// Creation is exclusive: if anything already exists at `path` it is
    /// left untouched and reported as [`Materialized::AlreadyPresent`].
    pub fn materialize(&self, path: &Path) -> Result<Materialized, SupervisorError> {
        if self.is_empty() {
            return Err(SupervisorError::NoEmbeddedBinary);
        }

        let materialize_error = |source: io::Error| SupervisorError::Materialize {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(materialize_error)?;
        }

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o700)
            .open(path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!("Signer binary already present at {:?}", path);
                return Ok(Materialized::AlreadyPresent);
            }
            Err(e) => return Err(materialize_error(e)),
        };

        if let Err(e) = file.write_all(&self.payload).and_then(|()| file.sync_all()) {
            drop(file);
            if let Err(remove_err) = fs::remove_file(path) {
                warn!("Failed to remove partial signer binary {:?}: {}", path, remove_err);
            }
            return Err(materialize_error(e));
        }

        info!("Wrote signer binary ({} bytes) to {:?}", self.payload.len(), path);
        Ok(Materialized::Written)
    }
}

impl std::fmt::Debug for EmbeddedBinary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedBinary")
            .field("len", &self.payload.len())
            .finish()
    }
}
