//! BLS12-381 signer service.
//!
//! This crate provides a signing service that runs in its own process and
//! answers key generation, signing, verification and aggregation requests
//! over a Unix socket. A host process spawns it, connects once, and keeps
//! the connection for its lifetime.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     Unix Socket     ┌─────────────────┐
//! │  Host process   │ ◄─────────────────► │  bls12381svc    │
//! │ (SignerClient)  │  Request/Response   │ (SignerServer)  │
//! └─────────────────┘                     └─────────────────┘
//! ```
//!
//! The service holds no keys. Every request carries the key material it
//! needs and the answer is computed with the same `bls-sign` primitives an
//! in-process caller would use.
//!
//! ## Usage
//!
//! ```bash
//! bls12381svc --socket /tmp/bls12381svc.sock
//! ```
//!
//! SIGINT removes the socket file and exits.

pub mod client;
pub mod protocol;
pub mod server;

pub use client::{ClientError, GeneratedKeys, SignerClient};
pub use protocol::{
    AggregatePkRequest, AggregateSigRequest, ErrorKind, FrameError, Request, RequestFrame,
    Response, ResponseFrame, SignRequest, VerifyRequest,
};
pub use server::{handle_request, ServerConfig, ServerError, SignerServer, DEFAULT_SOCKET_PATH};
