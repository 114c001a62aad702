//! Client for the signer service.
//!
//! Unlike a one-shot request client, [`SignerClient`] keeps a single
//! connection open and runs every exchange over it, one at a time.

use crate::protocol::{
    read_frame, write_frame, AggregatePkRequest, AggregateSigRequest, ErrorKind, FrameError,
    Request, RequestFrame, Response, ResponseFrame, SignRequest, VerifyRequest,
};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::trace;

/// Errors from talking to the signer service.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Service error ({kind:?}): {message}")]
    Service { kind: ErrorKind, message: String },

    #[error("Unexpected response to {0}")]
    UnexpectedResponse(&'static str),

    #[error("Response id {actual} does not match request id {expected}")]
    RequestIdMismatch { expected: u64, actual: u64 },
}

/// A freshly generated keypair as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedKeys {
    pub secret_key: Vec<u8>,
    pub public_key: Vec<u8>,
}

/// Persistent connection to the signer service.
pub struct SignerClient {
    stream: UnixStream,
    socket_path: PathBuf,
}

impl SignerClient {
    /// Open a connection to the service listening at `socket_path`.
    pub fn connect(socket_path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let socket_path = socket_path.as_ref().to_path_buf();
        let stream = UnixStream::connect(&socket_path)?;
        Ok(Self {
            stream,
            socket_path,
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Bound how long a single read or write may block. `None` blocks
    /// indefinitely.
    pub fn set_timeout(&self, timeout: Option<Duration>) -> Result<(), ClientError> {
        self.stream.set_read_timeout(timeout)?;
        self.stream.set_write_timeout(timeout)?;
        Ok(())
    }

    /// Run one exchange. Service-side errors come back as
    /// [`ClientError::Service`].
    fn call(&mut self, request: Request) -> Result<Response, ClientError> {
        let name = request.name();
        let frame = RequestFrame::new(request);
        let request_id = frame.request_id;
        trace!("Sending {} request, id={}", name, request_id);

        write_frame(&mut self.stream, &frame)?;
        let reply: ResponseFrame = read_frame(&mut self.stream)?;

        if reply.request_id != request_id {
            return Err(ClientError::RequestIdMismatch {
                expected: request_id,
                actual: reply.request_id,
            });
        }

        match reply.response {
            Response::Error { kind, message } => Err(ClientError::Service { kind, message }),
            response => Ok(response),
        }
    }

    /// Ping the service.
    pub fn ping(&mut self) -> Result<(), ClientError> {
        match self.call(Request::Ping)? {
            Response::Pong => Ok(()),
            _ => Err(ClientError::UnexpectedResponse("ping")),
        }
    }

    pub fn generate_keys(&mut self) -> Result<GeneratedKeys, ClientError> {
        match self.call(Request::GenerateKeys)? {
            Response::Keys {
                secret_key,
                public_key,
            } => Ok(GeneratedKeys {
                secret_key,
                public_key,
            }),
            _ => Err(ClientError::UnexpectedResponse("generate_keys")),
        }
    }

    pub fn sign(&mut self, sk: &[u8], pk: &[u8], message: &[u8]) -> Result<Vec<u8>, ClientError> {
        let request = Request::Sign(SignRequest {
            secret_key: sk.to_vec(),
            public_key: pk.to_vec(),
            message: message.to_vec(),
        });
        match self.call(request)? {
            Response::Signature(sig) => Ok(sig),
            _ => Err(ClientError::UnexpectedResponse("sign")),
        }
    }

    /// Returns the service's validity flag. `Ok(false)` is a failed
    /// pairing check, not a transport problem.
    pub fn verify(&mut self, apk: &[u8], sig: &[u8], message: &[u8]) -> Result<bool, ClientError> {
        let request = Request::Verify(VerifyRequest {
            apk: apk.to_vec(),
            signature: sig.to_vec(),
            message: message.to_vec(),
        });
        match self.call(request)? {
            Response::Verify { valid } => Ok(valid),
            _ => Err(ClientError::UnexpectedResponse("verify")),
        }
    }

    pub fn create_apk(&mut self, pk: &[u8]) -> Result<Vec<u8>, ClientError> {
        let request = Request::CreateApk {
            public_key: pk.to_vec(),
        };
        match self.call(request)? {
            Response::Apk(apk) => Ok(apk),
            _ => Err(ClientError::UnexpectedResponse("create_apk")),
        }
    }

    /// `keys` is the concatenation of `count` public keys.
    pub fn aggregate_pk(
        &mut self,
        apk: &[u8],
        keys: Vec<u8>,
        count: u32,
    ) -> Result<Vec<u8>, ClientError> {
        let request = Request::AggregatePk(AggregatePkRequest {
            apk: apk.to_vec(),
            keys,
            count,
        });
        match self.call(request)? {
            Response::Apk(apk) => Ok(apk),
            _ => Err(ClientError::UnexpectedResponse("aggregate_pk")),
        }
    }

    /// `signatures` is the concatenation of `count` signatures.
    pub fn aggregate_sig(
        &mut self,
        sig: &[u8],
        signatures: Vec<u8>,
        count: u32,
    ) -> Result<Vec<u8>, ClientError> {
        let request = Request::AggregateSig(AggregateSigRequest {
            signature: sig.to_vec(),
            signatures,
            count,
        });
        match self.call(request)? {
            Response::Signature(sig) => Ok(sig),
            _ => Err(ClientError::UnexpectedResponse("aggregate_sig")),
        }
    }

    /// Shut down both halves of the connection.
    pub fn close(self) -> Result<(), ClientError> {
        self.stream.shutdown(Shutdown::Both)?;
        Ok(())
    }
}
