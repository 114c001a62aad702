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

//! In-process backend calling the signing library directly.

use bls_sign::native::{self, Status};

use crate::backend::{concat_fixed, Backend, Keypair};
use crate::error::BackendError;

/// Runs every operation on the calling thread. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalBackend;

impl LocalBackend {
    pub fn new() -> Self {
        Self
    }
}

fn check(op: &str, status: Status) -> Result<(), BackendError> {
    match status {
        Status::Ok => Ok(()),
        other => Err(BackendError::from_status(op, other)),
    }
}

impl Backend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn generate_keys(&self) -> Result<Keypair, BackendError> {
        let mut sk = [0u8; native::SECRET_KEY_SIZE];
        let mut pk = [0u8; native::PUBLIC_KEY_SIZE];
        native::generate_keys(&mut sk, &mut pk);
        Ok(Keypair {
            secret_key: sk.to_vec(),
            public_key: pk.to_vec(),
        })
    }

    fn sign(
        &self,
        secret_key: &[u8],
        public_key: &[u8],
        message: &[u8],
    ) -> Result<Vec<u8>, BackendError> {
        let mut sig = [0u8; native::SIGNATURE_SIZE];
        check("sign", native::sign(secret_key, public_key, message, &mut sig))?;
        Ok(sig.to_vec())
    }

    fn verify(&self, apk: &[u8], signature: &[u8], message: &[u8]) -> Result<(), BackendError> {
        check("verify", native::verify(apk, signature, message))
    }

    fn create_apk(&self, public_key: &[u8]) -> Result<Vec<u8>, BackendError> {
        let mut apk = [0u8; native::APK_SIZE];
        check("create_apk", native::create_apk(public_key, &mut apk))?;
        Ok(apk.to_vec())
    }

    fn aggregate_pk(&self, apk: &[u8], public_keys: &[&[u8]]) -> Result<Vec<u8>, BackendError> {
        let keys = concat_fixed("public key", public_keys, native::PUBLIC_KEY_SIZE)?;
        let mut out = [0u8; native::APK_SIZE];
        check("aggregate_pk", native::aggregate_pk(apk, &keys, &mut out))?;
        Ok(out.to_vec())
    }

    fn aggregate_sig(
        &self,
        signature: &[u8],
        signatures: &[&[u8]],
    ) -> Result<Vec<u8>, BackendError> {
        let sigs = concat_fixed("signature", signatures, native::SIGNATURE_SIZE)?;
        let mut out = [0u8; native::SIGNATURE_SIZE];
        check("aggregate_sig", native::aggregate_sig(signature, &sigs, &mut out))?;
        Ok(out.to_vec())
    }
}
