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

use std::path::PathBuf;
use std::time::Duration;

use bls_remote_signer::{ClientError, ErrorKind};
use bls_sign::Status;
use thiserror::Error;

/// Errors returned by the six signing operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Bytes had the wrong size or did not decode. Nothing was processed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The pairing check failed.
    #[error("signature verification failed")]
    InvalidSignature,

    /// The remote backend is disconnected or unreachable.
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),

    /// The signing library returned a status outside its documented set.
    #[error("signing library reported an unknown error: {0}")]
    Unknown(String),
}

impl BackendError {
    pub(crate) fn invalid_length(what: &str, expected: usize, actual: usize) -> Self {
        BackendError::InvalidInput(format!(
            "{} must be {} bytes, got {}",
            what, expected, actual
        ))
    }

    /// Map a non-`Ok` native status. `Ok` is treated as unknown since it
    /// carries no error.
    pub(crate) fn from_status(op: &str, status: Status) -> Self {
        match status {
            Status::InvalidBytes => BackendError::InvalidInput(format!("{}: invalid bytes provided", op)),
            Status::VerificationFailed => BackendError::InvalidSignature,
            Status::Ok | Status::Unknown => {
                BackendError::Unknown(format!("{}: status code {}", op, status.code()))
            }
        }
    }
}

impl From<ClientError> for BackendError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Service {
                kind: ErrorKind::InvalidInput,
                message,
            } => BackendError::InvalidInput(message),
            ClientError::Service {
                kind: ErrorKind::Unknown,
                message,
            } => BackendError::Unknown(message),
            other => BackendError::TransportUnavailable(other.to_string()),
        }
    }
}

/// Lifecycle failures of the out-of-process signer.
///
/// These are fatal: once the service binary cannot be materialized,
/// started or reached there is no degraded mode to fall back to.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("no signer binary is bundled with this build")]
    NoEmbeddedBinary,

    #[error("failed to write signer binary to {path:?}: {source}")]
    Materialize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read signer binary from {path:?}: {source}")]
    ReadPayload {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn signer {path:?}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("signer exited during handshake with {0}")]
    ChildExited(std::process::ExitStatus),

    #[error("no handshake with signer at {socket:?} after {waited:?}: {last_error}")]
    HandshakeTimeout {
        socket: PathBuf,
        waited: Duration,
        last_error: String,
    },

    #[error("failed to signal signer pid {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: nix::Error,
    },

    #[error("signer pid {pid} did not exit within {waited:?}")]
    ExitTimeout { pid: u32, waited: Duration },

    #[error("failed to load supervisor config {path:?}: {reason}")]
    Config { path: PathBuf, reason: String },
}
