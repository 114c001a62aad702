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

//! Supervisor configuration.
//!
//! ```ignore
//! use bls_backend::SupervisorConfig;
//!
//! let config = SupervisorConfig::load("/etc/bls/supervisor.json")?
//!     .with_handshake_timeout(Duration::from_secs(2));
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bls_remote_signer::DEFAULT_SOCKET_PATH;
use serde::{Deserialize, Serialize};

use crate::error::SupervisorError;

/// Default location the service binary is materialized to.
pub const DEFAULT_BINARY_PATH: &str = "/tmp/bls12381svc";

/// Where the signer lives on disk and how long lifecycle steps may take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Path to the Unix socket the service binds
    pub socket_path: PathBuf,
    /// Path the embedded service binary is written to
    pub binary_path: PathBuf,
    /// Maximum time from spawn to a successful ping
    pub handshake_timeout_ms: u64,
    /// Maximum time from SIGINT to child exit
    pub exit_timeout_ms: u64,
    /// First delay between dial attempts
    pub dial_backoff_base_ms: u64,
    /// Cap on the delay between dial attempts
    pub dial_backoff_max_ms: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            binary_path: PathBuf::from(DEFAULT_BINARY_PATH),
            handshake_timeout_ms: 5_000,
            exit_timeout_ms: 5_000,
            dial_backoff_base_ms: 10,
            dial_backoff_max_ms: 250,
        }
    }
}

impl SupervisorConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SupervisorError> {
        let path = path.as_ref();
        let config_error = |reason: String| SupervisorError::Config {
            path: path.to_path_buf(),
            reason,
        };

        let file = File::open(path).map_err(|e| config_error(e.to_string()))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| config_error(e.to_string()))
    }

    /// Keep both filesystem artifacts under `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            socket_path: dir.join("bls12381svc.sock"),
            binary_path: dir.join("bls12381svc"),
            ..Self::default()
        }
    }

    pub fn with_socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket_path = path.into();
        self
    }

    pub fn with_binary_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary_path = path.into();
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout_ms = millis(timeout);
        self
    }

    pub fn with_exit_timeout(mut self, timeout: Duration) -> Self {
        self.exit_timeout_ms = millis(timeout);
        self
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn exit_timeout(&self) -> Duration {
        Duration::from_millis(self.exit_timeout_ms)
    }

    pub fn dial_backoff_base(&self) -> Duration {
        Duration::from_millis(self.dial_backoff_base_ms)
    }

    pub fn dial_backoff_max(&self) -> Duration {
        Duration::from_millis(self.dial_backoff_max_ms)
    }
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_timeouts_saturate() {
        let config = SupervisorConfig::default()
            .with_handshake_timeout(Duration::MAX)
            .with_exit_timeout(Duration::from_micros(1500));
        assert_eq!(config.handshake_timeout_ms, u64::MAX);
        assert_eq!(config.exit_timeout_ms, 1);
    }

    #[test]
    fn test_defaults_match_service() {
        let config = SupervisorConfig::default();
        assert_eq!(config.socket_path, PathBuf::from("/tmp/bls12381svc.sock"));
        assert_eq!(config.binary_path, PathBuf::from("/tmp/bls12381svc"));
        assert_eq!(config.handshake_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_load_partial_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("supervisor.json");
        std::fs::write(
            &path,
            r#"{ "socket_path": "/run/bls/svc.sock", "exit_timeout_ms": 250 }"#,
        )
        .unwrap();

        let config = SupervisorConfig::load(&path).unwrap();
        assert_eq!(config.socket_path, PathBuf::from("/run/bls/svc.sock"));
        assert_eq!(config.exit_timeout(), Duration::from_millis(250));
        assert_eq!(config.binary_path, PathBuf::from(DEFAULT_BINARY_PATH));
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = SupervisorConfig::load(temp_dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, SupervisorError::Config { .. }));
    }
}
