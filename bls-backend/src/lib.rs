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

//! Swappable BLS12-381 signing backends.
//!
//! [`LocalBackend`] runs the signing library in-process. [`RemoteBackend`]
//! forwards to a `bls12381svc` child that a [`Supervisor`] materializes
//! from an [`EmbeddedBinary`], spawns and tears down. [`BackendSwitch`]
//! routes the [`Backend`] operations to whichever one is active:
//!
//! ```text
//! caller ──► BackendSwitch ──┬──► LocalBackend ──► bls_sign::native
//!                            └──► RemoteBackend ──► Supervisor
//!                                                      │ unix socket
//!                                                      ▼
//!                                                  bls12381svc
//! ```
//!
//! Lifecycle failures are returned as [`SupervisorError`] and are not
//! retried here; callers decide whether to abort.

mod backoff;
pub mod backend;
pub mod config;
pub mod embedded;
pub mod error;
pub mod local;
pub mod remote;
pub mod supervisor;
pub mod switch;

pub use backend::{Backend, Keypair, APK_SIZE, PUBLIC_KEY_SIZE, SECRET_KEY_SIZE, SIGNATURE_SIZE};
pub use config::{SupervisorConfig, DEFAULT_BINARY_PATH};
pub use embedded::{EmbeddedBinary, Materialized};
pub use error::{BackendError, SupervisorError};
pub use local::LocalBackend;
pub use remote::RemoteBackend;
pub use supervisor::Supervisor;
pub use switch::{BackendKind, BackendSwitch};
