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

//! Byte-buffer entry points.
//!
//! Every function writes into a caller-provided, fixed-size output buffer
//! and reports a [`Status`]. Output buffers are left untouched unless the
//! status is [`Status::Ok`]. Aggregation entry points take the additional
//! elements as one concatenated buffer whose length must be a whole
//! multiple of the element size.

use crate::{Apk, BlsError, PublicKey, SecretKey, Signature};

pub const SECRET_KEY_SIZE: usize = SecretKey::SIZE;
pub const PUBLIC_KEY_SIZE: usize = PublicKey::SIZE;
pub const APK_SIZE: usize = Apk::SIZE;
pub const SIGNATURE_SIZE: usize = Signature::SIZE;

/// Result code of a native call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Status {
    Ok = 0,
    InvalidBytes = 1,
    VerificationFailed = 2,
    Unknown = 3,
}

impl Status {
    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }

    pub fn code(self) -> i32 {
        self as i32
    }
}

impl From<i32> for Status {
    fn from(code: i32) -> Self {
        match code {
            0 => Status::Ok,
            1 => Status::InvalidBytes,
            2 => Status::VerificationFailed,
            _ => Status::Unknown,
        }
    }
}

impl From<BlsError> for Status {
    fn from(e: BlsError) -> Self {
        match e {
            BlsError::InvalidLength { .. } | BlsError::InvalidEncoding(_) => Status::InvalidBytes,
            BlsError::InvalidSignature => Status::VerificationFailed,
        }
    }
}

macro_rules! unwrap_or_bail {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(e) => return Status::from(e),
        }
    };
}

/// Split a concatenated buffer into `size`-byte elements and decode each.
fn decode_all<T>(
    bytes: &[u8],
    size: usize,
    decode: impl Fn(&[u8]) -> Result<T, BlsError>,
) -> Result<Vec<T>, BlsError> {
    if bytes.len() % size != 0 {
        return Err(BlsError::InvalidLength {
            expected: (bytes.len() / size + 1) * size,
            actual: bytes.len(),
        });
    }
    bytes.chunks_exact(size).map(decode).collect()
}

pub fn generate_keys(sk_out: &mut [u8; SECRET_KEY_SIZE], pk_out: &mut [u8; PUBLIC_KEY_SIZE]) {
    let sk = SecretKey::random(&mut rand::thread_rng());
    sk_out.copy_from_slice(&sk.to_bytes());
    pk_out.copy_from_slice(&sk.public_key().to_bytes());
}

pub fn sign(sk: &[u8], pk: &[u8], msg: &[u8], sig_out: &mut [u8; SIGNATURE_SIZE]) -> Status {
    let sk = unwrap_or_bail!(SecretKey::from_bytes(sk));
    let pk = unwrap_or_bail!(PublicKey::from_bytes(pk));

    sig_out.copy_from_slice(&sk.sign(&pk, msg).to_bytes());
    Status::Ok
}

pub fn verify(apk: &[u8], sig: &[u8], msg: &[u8]) -> Status {
    let apk = unwrap_or_bail!(Apk::from_bytes(apk));
    let sig = unwrap_or_bail!(Signature::from_bytes(sig));

    match apk.verify(&sig, msg) {
        Ok(()) => Status::Ok,
        Err(e) => e.into(),
    }
}

pub fn create_apk(pk: &[u8], apk_out: &mut [u8; APK_SIZE]) -> Status {
    let pk = unwrap_or_bail!(PublicKey::from_bytes(pk));

    apk_out.copy_from_slice(&Apk::from(&pk).to_bytes());
    Status::Ok
}

pub fn aggregate_pk(apk: &[u8], pks: &[u8], apk_out: &mut [u8; APK_SIZE]) -> Status {
    let apk = unwrap_or_bail!(Apk::from_bytes(apk));
    let pks = unwrap_or_bail!(decode_all(pks, PUBLIC_KEY_SIZE, PublicKey::from_bytes));

    apk_out.copy_from_slice(&apk.aggregate(&pks).to_bytes());
    Status::Ok
}

pub fn aggregate_sig(sig: &[u8], sigs: &[u8], sig_out: &mut [u8; SIGNATURE_SIZE]) -> Status {
    let sig = unwrap_or_bail!(Signature::from_bytes(sig));
    let sigs = unwrap_or_bail!(decode_all(sigs, SIGNATURE_SIZE, Signature::from_bytes));

    sig_out.copy_from_slice(&sig.aggregate(&sigs).to_bytes());
    Status::Ok
}
