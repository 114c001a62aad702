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

//! Backend forwarding every operation to the supervised signer service.

use tracing::debug;

use crate::backend::{concat_fixed, Backend, Keypair, PUBLIC_KEY_SIZE, SIGNATURE_SIZE};
use crate::config::SupervisorConfig;
use crate::embedded::EmbeddedBinary;
use crate::error::{BackendError, SupervisorError};
use crate::supervisor::Supervisor;

/// Out-of-process backend. Operations fail with
/// [`BackendError::TransportUnavailable`] until [`RemoteBackend::connect`]
/// succeeds.
pub struct RemoteBackend {
    supervisor: Supervisor,
}

impl RemoteBackend {
    pub fn new(config: SupervisorConfig, binary: EmbeddedBinary) -> Self {
        Self {
            supervisor: Supervisor::new(config, binary),
        }
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn connect(&self) -> Result<(), SupervisorError> {
        self.supervisor.connect()
    }

    pub fn disconnect(&self) -> Result<(), SupervisorError> {
        self.supervisor.disconnect()
    }

    pub fn is_connected(&self) -> bool {
        self.supervisor.is_connected()
    }
}

fn element_count(what: &str, parts: &[&[u8]]) -> Result<u32, BackendError> {
    u32::try_from(parts.len())
        .map_err(|_| BackendError::InvalidInput(format!("too many {}s: {}", what, parts.len())))
}

impl Backend for RemoteBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn generate_keys(&self) -> Result<Keypair, BackendError> {
        let keys = self
            .supervisor
            .with_client("generate_keys", |client| client.generate_keys())?;
        Ok(Keypair {
            secret_key: keys.secret_key,
            public_key: keys.public_key,
        })
    }

    fn sign(
        &self,
        secret_key: &[u8],
        public_key: &[u8],
        message: &[u8],
    ) -> Result<Vec<u8>, BackendError> {
        self.supervisor
            .with_client("sign", |client| client.sign(secret_key, public_key, message))
    }

    fn verify(&self, apk: &[u8], signature: &[u8], message: &[u8]) -> Result<(), BackendError> {
        // Transport failures surface from `with_client`; only a delivered
        // `false` is a rejected signature.
        let valid = self
            .supervisor
            .with_client("verify", |client| client.verify(apk, signature, message))?;
        if valid {
            Ok(())
        } else {
            debug!("Signer rejected signature");
            Err(BackendError::InvalidSignature)
        }
    }

    fn create_apk(&self, public_key: &[u8]) -> Result<Vec<u8>, BackendError> {
        self.supervisor
            .with_client("create_apk", |client| client.create_apk(public_key))
    }

    fn aggregate_pk(&self, apk: &[u8], public_keys: &[&[u8]]) -> Result<Vec<u8>, BackendError> {
        let count = element_count("public key", public_keys)?;
        let keys = concat_fixed("public key", public_keys, PUBLIC_KEY_SIZE)?;
        self.supervisor
            .with_client("aggregate_pk", |client| client.aggregate_pk(apk, keys, count))
    }

    fn aggregate_sig(
        &self,
        signature: &[u8],
        signatures: &[&[u8]],
    ) -> Result<Vec<u8>, BackendError> {
        let count = element_count("signature", signatures)?;
        let sigs = concat_fixed("signature", signatures, SIGNATURE_SIZE)?;
        self.supervisor.with_client("aggregate_sig", |client| {
            client.aggregate_sig(signature, sigs, count)
        })
    }
}
