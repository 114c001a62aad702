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

use bls12_381::{pairing, G1Affine, G1Projective, G2Affine, G2Projective, Scalar};
use rand::{CryptoRng, RngCore};
use thiserror::Error;

use crate::hash::{h0, h1};

/// Errors produced while decoding or verifying BLS values.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BlsError {
    #[error("invalid bytes: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("bytes do not encode a valid {0}")]
    InvalidEncoding(&'static str),

    #[error("signature verification failed")]
    InvalidSignature,
}

fn fixed<const N: usize>(bytes: &[u8]) -> Result<&[u8; N], BlsError> {
    bytes.try_into().map_err(|_| BlsError::InvalidLength {
        expected: N,
        actual: bytes.len(),
    })
}

/// A BLS secret key: a scalar of the BLS12-381 group order.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SecretKey(Scalar);

impl SecretKey {
    pub const SIZE: usize = 32;

    /// Sample a secret key from a cryptographically secure rng.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut wide = [0u8; 64];
        rng.fill_bytes(&mut wide);
        Self(Scalar::from_bytes_wide(&wide))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BlsError> {
        Option::from(Scalar::from_bytes(fixed::<32>(bytes)?))
            .map(Self)
            .ok_or(BlsError::InvalidEncoding("secret key"))
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(G2Affine::from(G2Affine::generator() * self.0))
    }

    /// Sign `msg` in the rogue-key resistant construction: the plain
    /// signature `H0(m)·sk` is additionally weighted by `H1(pk)`.
    pub fn sign(&self, pk: &PublicKey, msg: &[u8]) -> Signature {
        let weighted = self.0 * h1(pk);
        Signature(G1Affine::from(h0(msg) * weighted))
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// A BLS public key, `g2·sk`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicKey(G2Affine);

impl PublicKey {
    pub const SIZE: usize = 96;

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BlsError> {
        Option::from(G2Affine::from_compressed(fixed::<96>(bytes)?))
            .map(Self)
            .ok_or(BlsError::InvalidEncoding("public key"))
    }

    pub fn to_bytes(&self) -> [u8; 96] {
        self.0.to_compressed()
    }

    /// The public key weighted by its own hash, `pk·H1(pk)`.
    fn weighted(&self) -> G2Projective {
        self.0 * h1(self)
    }
}

impl From<&SecretKey> for PublicKey {
    fn from(sk: &SecretKey) -> Self {
        sk.public_key()
    }
}

/// Aggregated public key. A single public key becomes an [`Apk`] through
/// [`Apk::from`]; more keys are folded in with [`Apk::aggregate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Apk(G2Affine);

impl Apk {
    pub const SIZE: usize = 96;

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BlsError> {
        Option::from(G2Affine::from_compressed(fixed::<96>(bytes)?))
            .map(Self)
            .ok_or(BlsError::InvalidEncoding("aggregated public key"))
    }

    pub fn to_bytes(&self) -> [u8; 96] {
        self.0.to_compressed()
    }

    pub fn aggregate(&self, pks: &[PublicKey]) -> Self {
        let sum = pks
            .iter()
            .fold(G2Projective::from(self.0), |acc, pk| acc + pk.weighted());
        Self(G2Affine::from(sum))
    }

    /// Check `e(sig, g2) == e(H0(m), apk)`.
    pub fn verify(&self, sig: &Signature, msg: &[u8]) -> Result<(), BlsError> {
        let lhs = pairing(&sig.0, &G2Affine::generator());
        let rhs = pairing(&h0(msg), &self.0);
        if lhs == rhs {
            Ok(())
        } else {
            Err(BlsError::InvalidSignature)
        }
    }
}

impl From<&PublicKey> for Apk {
    fn from(pk: &PublicKey) -> Self {
        Self(G2Affine::from(pk.weighted()))
    }
}

/// A BLS signature, possibly aggregated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature(G1Affine);

impl Signature {
    pub const SIZE: usize = 48;

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BlsError> {
        Option::from(G1Affine::from_compressed(fixed::<48>(bytes)?))
            .map(Self)
            .ok_or(BlsError::InvalidEncoding("signature"))
    }

    pub fn to_bytes(&self) -> [u8; 48] {
        self.0.to_compressed()
    }

    /// Aggregate by adding up the points.
    pub fn aggregate(&self, sigs: &[Signature]) -> Self {
        let sum = sigs
            .iter()
            .fold(G1Projective::from(self.0), |acc, sig| acc + sig.0);
        Self(G1Affine::from(sum))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_wrong_length_rejected() {
        assert_eq!(
            SecretKey::from_bytes(&[0u8; 31]),
            Err(BlsError::InvalidLength {
                expected: 32,
                actual: 31
            })
        );
        assert!(PublicKey::from_bytes(&[0u8; 97]).is_err());
        assert!(Signature::from_bytes(&[]).is_err());
    }

    #[test]
    fn test_plain_public_key_does_not_verify() {
        let mut rng = StdRng::seed_from_u64(7);
        let sk = SecretKey::random(&mut rng);
        let pk = sk.public_key();
        let sig = sk.sign(&pk, b"msg");

        // Verifying against the unweighted key must fail.
        let plain = Apk::from_bytes(&pk.to_bytes()).unwrap();
        assert_eq!(plain.verify(&sig, b"msg"), Err(BlsError::InvalidSignature));
        assert!(Apk::from(&pk).verify(&sig, b"msg").is_ok());
    }

    #[test]
    fn test_secret_key_bytes_roundtrip() {
        let mut rng = StdRng::seed_from_u64(11);
        let sk = SecretKey::random(&mut rng);
        assert_eq!(SecretKey::from_bytes(&sk.to_bytes()).unwrap(), sk);
    }
}
