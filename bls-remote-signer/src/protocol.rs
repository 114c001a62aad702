//! Wire protocol for signer service communication.
//!
//! Uses a simple length-prefixed binary format over Unix sockets: a
//! little-endian `u64` body length followed by a bincode body. A single
//! connection carries any number of request/response exchanges.
//!
//! Messages are unbounded in the signing API, so frames are too. The
//! reader grows its buffer as bytes arrive instead of trusting the prefix.

use std::io::{self, Read, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Size of the length prefix.
pub const FRAME_HEADER_LEN: usize = 8;

/// Initial read buffer; larger bodies grow it as they arrive.
const READ_CHUNK: usize = 64 * 1024;

/// Request to sign a message with a caller-supplied keypair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignRequest {
    pub secret_key: Vec<u8>,
    pub public_key: Vec<u8>,
    pub message: Vec<u8>,
}

/// Request to verify a signature against an aggregated public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub apk: Vec<u8>,
    pub signature: Vec<u8>,
    pub message: Vec<u8>,
}

/// Request to fold public keys into an aggregated public key.
///
/// `keys` is the concatenation of `count` public keys. The service splits
/// it; the client only concatenates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatePkRequest {
    pub apk: Vec<u8>,
    pub keys: Vec<u8>,
    pub count: u32,
}

/// Request to fold signatures into one signature. Framed like
/// [`AggregatePkRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateSigRequest {
    pub signature: Vec<u8>,
    pub signatures: Vec<u8>,
    pub count: u32,
}

/// All possible messages from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    GenerateKeys,
    Sign(SignRequest),
    Verify(VerifyRequest),
    CreateApk { public_key: Vec<u8> },
    AggregatePk(AggregatePkRequest),
    AggregateSig(AggregateSigRequest),
    Ping,
}

impl Request {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Request::GenerateKeys => "generate_keys",
            Request::Sign(_) => "sign",
            Request::Verify(_) => "verify",
            Request::CreateApk { .. } => "create_apk",
            Request::AggregatePk(_) => "aggregate_pk",
            Request::AggregateSig(_) => "aggregate_sig",
            Request::Ping => "ping",
        }
    }
}

/// Category of a service-side failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Bytes had the wrong size or did not decode.
    InvalidInput,
    /// The signing library reported an unknown status.
    Unknown,
    /// The request itself was malformed.
    Protocol,
}

/// All possible messages from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    Keys {
        secret_key: Vec<u8>,
        public_key: Vec<u8>,
    },
    /// Result of `Sign` and `AggregateSig`.
    Signature(Vec<u8>),
    /// Result of `Verify`. A negative pairing check is `valid: false`,
    /// not an error.
    Verify { valid: bool },
    /// Result of `CreateApk` and `AggregatePk`.
    Apk(Vec<u8>),
    Error { kind: ErrorKind, message: String },
    Pong,
}

/// Request envelope. The response echoes `request_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestFrame {
    pub request_id: u64,
    pub request: Request,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub request_id: u64,
    pub response: Response,
}

impl RequestFrame {
    pub fn new(request: Request) -> Self {
        Self {
            request_id: generate_request_id(),
            request,
        }
    }
}

/// Errors reading or writing frames.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Frame too large: {0} bytes")]
    TooLarge(u64),
}

impl FrameError {
    /// Whether the peer closed the connection, between frames or inside one.
    pub fn is_eof(&self) -> bool {
        matches!(self, FrameError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
    }
}

/// Serialize `value` and write it as one frame.
pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, value: &T) -> Result<(), FrameError> {
    let body = bincode::serialize(value)?;
    let len = u64::try_from(body.len()).map_err(|_| FrameError::TooLarge(u64::MAX))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&body)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame and deserialize it.
pub fn read_frame<R: Read, T: DeserializeOwned>(reader: &mut R) -> Result<T, FrameError> {
    let mut len_buf = [0u8; FRAME_HEADER_LEN];
    reader.read_exact(&mut len_buf)?;
    let len = u64::from_le_bytes(len_buf);
    let expected = usize::try_from(len).map_err(|_| FrameError::TooLarge(len))?;

    let mut body = Vec::with_capacity(expected.min(READ_CHUNK));
    reader.by_ref().take(len).read_to_end(&mut body)?;
    if body.len() != expected {
        return Err(FrameError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("frame truncated at {} of {} bytes", body.len(), expected),
        )));
    }
    Ok(bincode::deserialize(&body)?)
}

/// Generate a unique request ID based on timestamp and random component.
fn generate_request_id() -> u64 {
    use rand::Rng;
    use std::time::{SystemTime, UNIX_EPOCH};
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    // Mix in some randomness
    let random: u32 = rand::thread_rng().gen();
    timestamp ^ (random as u64)
}
