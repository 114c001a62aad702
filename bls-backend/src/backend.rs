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

//! The signing contract shared by every backend.

use crate::error::BackendError;

pub use bls_sign::{APK_SIZE, PUBLIC_KEY_SIZE, SECRET_KEY_SIZE, SIGNATURE_SIZE};

/// A secret/public key pair in their serialized forms.
#[derive(Clone, PartialEq, Eq)]
pub struct Keypair {
    pub secret_key: Vec<u8>,
    pub public_key: Vec<u8>,
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// BLS12-381 signing operations.
///
/// Every implementation must give the same results for the same inputs;
/// only the error detail may differ. Key, apk and signature sizes are the
/// fixed `*_SIZE` constants and inputs of any other length are rejected
/// with [`BackendError::InvalidInput`].
pub trait Backend: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Produce a fresh keypair.
    fn generate_keys(&self) -> Result<Keypair, BackendError>;

    /// Sign `message`. Deterministic in its inputs.
    fn sign(&self, secret_key: &[u8], public_key: &[u8], message: &[u8])
        -> Result<Vec<u8>, BackendError>;

    /// Verify `signature` over `message` against an aggregated public key.
    fn verify(&self, apk: &[u8], signature: &[u8], message: &[u8]) -> Result<(), BackendError>;

    /// Turn a single public key into its aggregated form.
    fn create_apk(&self, public_key: &[u8]) -> Result<Vec<u8>, BackendError>;

    /// Fold raw public keys into `apk`. The result does not depend on the
    /// order of the keys or on how the folding is batched.
    fn aggregate_pk(&self, apk: &[u8], public_keys: &[&[u8]]) -> Result<Vec<u8>, BackendError>;

    /// Fold signatures into `signature`.
    fn aggregate_sig(&self, signature: &[u8], signatures: &[&[u8]])
        -> Result<Vec<u8>, BackendError>;
}

impl<B: Backend + ?Sized> Backend for std::sync::Arc<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn generate_keys(&self) -> Result<Keypair, BackendError> {
        (**self).generate_keys()
    }

    fn sign(
        &self,
        secret_key: &[u8],
        public_key: &[u8],
        message: &[u8],
    ) -> Result<Vec<u8>, BackendError> {
        (**self).sign(secret_key, public_key, message)
    }

    fn verify(&self, apk: &[u8], signature: &[u8], message: &[u8]) -> Result<(), BackendError> {
        (**self).verify(apk, signature, message)
    }

    fn create_apk(&self, public_key: &[u8]) -> Result<Vec<u8>, BackendError> {
        (**self).create_apk(public_key)
    }

    fn aggregate_pk(&self, apk: &[u8], public_keys: &[&[u8]]) -> Result<Vec<u8>, BackendError> {
        (**self).aggregate_pk(apk, public_keys)
    }

    fn aggregate_sig(
        &self,
        signature: &[u8],
        signatures: &[&[u8]],
    ) -> Result<Vec<u8>, BackendError> {
        (**self).aggregate_sig(signature, signatures)
    }
}

/// Concatenate fixed-size elements into one buffer.
///
/// Each element is checked on its own: two wrong-sized elements could
/// otherwise add up to a valid total length.
pub(crate) fn concat_fixed(
    what: &str,
    parts: &[&[u8]],
    size: usize,
) -> Result<Vec<u8>, BackendError> {
    let mut out = Vec::with_capacity(parts.len() * size);
    for (i, part) in parts.iter().enumerate() {
        if part.len() != size {
            return Err(BackendError::invalid_length(
                &format!("{} #{}", what, i),
                size,
                part.len(),
            ));
        }
        out.extend_from_slice(part);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_fixed() {
        let a = [1u8; 4];
        let b = [2u8; 4];
        let out = concat_fixed("key", &[&a[..], &b[..]], 4).unwrap();
        assert_eq!(out, vec![1, 1, 1, 1, 2, 2, 2, 2]);
        assert!(concat_fixed("key", &[], 4).unwrap().is_empty());
    }

    #[test]
    fn test_concat_fixed_rejects_compensating_lengths() {
        let short = [0u8; 3];
        let long = [0u8; 5];
        let err = concat_fixed("key", &[&short[..], &long[..]], 4).unwrap_err();
        assert_eq!(
            err,
            BackendError::InvalidInput("key #0 must be 4 bytes, got 3".to_string())
        );
    }

    #[test]
    fn test_keypair_debug_hides_secret() {
        let keypair = Keypair {
            secret_key: vec![0xAA; 32],
            public_key: vec![1],
        };
        let rendered = format!("{:?}", keypair);
        assert!(!rendered.contains("170"));
        assert!(rendered.contains("public_key"));
    }
}
