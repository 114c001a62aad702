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

//! BLS12-381 signing primitives.
//!
//! Public keys live in G2 (96 bytes compressed) and signatures in G1
//! (48 bytes compressed). Keys are aggregated in the rogue-key resistant
//! way: every public key is weighted by `H1(pk)` before it is combined,
//! and signatures carry the same weight.
//!
//! Consumers should treat [`native`] as the stable surface. It mirrors a
//! C-style library: fixed-size output buffers, byte-slice inputs and a
//! [`Status`] code instead of rich errors. The typed keys are exposed for
//! tests and tooling.

mod hash;
mod keys;
pub mod native;

pub use hash::{h0, h1, DST};
pub use keys::{Apk, BlsError, PublicKey, SecretKey, Signature};
pub use native::{
    Status, APK_SIZE, PUBLIC_KEY_SIZE, SECRET_KEY_SIZE, SIGNATURE_SIZE,
};
