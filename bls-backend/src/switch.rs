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

//! Runtime selection between the local and remote backends.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::backend::{Backend, Keypair};
use crate::error::{BackendError, SupervisorError};
use crate::local::LocalBackend;
use crate::remote::RemoteBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Local,
    Remote,
}

/// Routes every operation to whichever backend is active.
///
/// Starts on [`BackendKind::Local`]. Operations hold the selection for
/// their whole duration, so switching waits for in-flight calls and a
/// call never observes a half-switched state.
pub struct BackendSwitch {
    local: LocalBackend,
    remote: RemoteBackend,
    active: RwLock<BackendKind>,
}

impl BackendSwitch {
    pub fn new(remote: RemoteBackend) -> Self {
        Self {
            local: LocalBackend::new(),
            remote,
            active: RwLock::new(BackendKind::Local),
        }
    }

    pub fn active(&self) -> BackendKind {
        *self.active.read()
    }

    pub fn remote(&self) -> &RemoteBackend {
        &self.remote
    }

    /// Route to the in-process backend, tearing down the service first if
    /// it is running. The switch happens even if teardown fails; the
    /// teardown error is still returned.
    pub fn activate_local(&self) -> Result<(), SupervisorError> {
        let mut active = self.active.write();
        let teardown = if self.remote.is_connected() {
            self.remote.disconnect()
        } else {
            Ok(())
        };
        *active = BackendKind::Local;
        info!("Activated local signing backend");
        teardown
    }

    /// Start the service and route to it. On failure the previous
    /// selection is kept.
    pub fn activate_remote(&self) -> Result<(), SupervisorError> {
        let mut active = self.active.write();
        self.remote.connect()?;
        *active = BackendKind::Remote;
        info!("Activated remote signing backend");
        Ok(())
    }

    fn with_active<T>(&self, f: impl FnOnce(&dyn Backend) -> T) -> T {
        let active = self.active.read();
        match *active {
            BackendKind::Local => f(&self.local),
            BackendKind::Remote => f(&self.remote),
        }
    }
}

impl Backend for BackendSwitch {
    fn name(&self) -> &'static str {
        self.with_active(|backend| backend.name())
    }

    fn generate_keys(&self) -> Result<Keypair, BackendError> {
        self.with_active(|backend| backend.generate_keys())
    }

    fn sign(
        &self,
        secret_key: &[u8],
        public_key: &[u8],
        message: &[u8],
    ) -> Result<Vec<u8>, BackendError> {
        self.with_active(|backend| backend.sign(secret_key, public_key, message))
    }

    fn verify(&self, apk: &[u8], signature: &[u8], message: &[u8]) -> Result<(), BackendError> {
        self.with_active(|backend| backend.verify(apk, signature, message))
    }

    fn create_apk(&self, public_key: &[u8]) -> Result<Vec<u8>, BackendError> {
        self.with_active(|backend| backend.create_apk(public_key))
    }

    fn aggregate_pk(&self, apk: &[u8], public_keys: &[&[u8]]) -> Result<Vec<u8>, BackendError> {
        self.with_active(|backend| backend.aggregate_pk(apk, public_keys))
    }

    fn aggregate_sig(
        &self,
        signature: &[u8],
        signatures: &[&[u8]],
    ) -> Result<Vec<u8>, BackendError> {
        self.with_active(|backend| backend.aggregate_sig(signature, signatures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SupervisorConfig;
    use crate::embedded::EmbeddedBinary;
    use tempfile::TempDir;

    fn switch(dir: &TempDir, binary: EmbeddedBinary) -> BackendSwitch {
        BackendSwitch::new(RemoteBackend::new(
            SupervisorConfig::in_dir(dir.path()),
            binary,
        ))
    }

    #[test]
    fn test_starts_local() {
        let temp_dir = TempDir::new().unwrap();
        let switch = switch(&temp_dir, EmbeddedBinary::from_bytes(Vec::new()));
        assert_eq!(switch.active(), BackendKind::Local);
        assert_eq!(switch.name(), "local");

        let keys = switch.generate_keys().unwrap();
        let sig = switch.sign(&keys.secret_key, &keys.public_key, b"m").unwrap();
        let apk = switch.create_apk(&keys.public_key).unwrap();
        assert_eq!(switch.verify(&apk, &sig, b"m"), Ok(()));
    }

    #[test]
    fn test_failed_remote_activation_keeps_local() {
        let temp_dir = TempDir::new().unwrap();
        let switch = switch(&temp_dir, EmbeddedBinary::from_bytes(Vec::new()));

        let err = switch.activate_remote().unwrap_err();
        assert!(matches!(err, SupervisorError::NoEmbeddedBinary));
        assert_eq!(switch.active(), BackendKind::Local);
        assert!(switch.generate_keys().is_ok());
    }

    #[test]
    fn test_activate_local_when_already_local() {
        let temp_dir = TempDir::new().unwrap();
        let switch = switch(&temp_dir, EmbeddedBinary::from_bytes(Vec::new()));
        switch.activate_local().unwrap();
        switch.activate_local().unwrap();
        assert_eq!(switch.active(), BackendKind::Local);
    }

    #[test]
    fn test_backend_kind_serde() {
        assert_eq!(
            serde_json::to_string(&BackendKind::Remote).unwrap(),
            r#""remote""#
        );
        let kind: BackendKind = serde_json::from_str(r#""local""#).unwrap();
        assert_eq!(kind, BackendKind::Local);
    }
}
