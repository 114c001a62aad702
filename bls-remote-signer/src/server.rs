//! Signer service implementation.
//!
//! Listens on a Unix socket and answers requests by calling the native
//! signing library. The service is stateless: keys travel with each
//! request.

use crate::protocol::{
    read_frame, write_frame, AggregatePkRequest, AggregateSigRequest, ErrorKind, FrameError,
    Request, RequestFrame, Response, ResponseFrame, SignRequest, VerifyRequest,
};
use bls_sign::native::{self, Status};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::thread;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Default socket path the service binds and the supervisor dials.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/bls12381svc.sock";

/// Server configuration.
pub struct ServerConfig {
    /// Path to Unix socket
    pub socket_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
        }
    }
}

/// Errors from the signer server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),
}

/// Signer service bound to a Unix socket.
pub struct SignerServer {
    listener: UnixListener,
    socket_path: PathBuf,
}

impl SignerServer {
    /// Create a new signer server.
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        // Remove existing socket file if it exists
        if config.socket_path.exists() {
            std::fs::remove_file(&config.socket_path)?;
        }

        // Ensure parent directory exists
        if let Some(parent) = config.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&config.socket_path)?;
        info!("Signer service listening on {:?}", config.socket_path);

        // Set socket permissions (owner only)
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&config.socket_path, perms)?;
        }

        Ok(Self {
            listener,
            socket_path: config.socket_path,
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Run the server (blocking). Each connection is served on its own
    /// thread.
    pub fn run(&self) -> Result<(), ServerError> {
        info!("Signer service starting...");

        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    debug!("New connection");
                    thread::spawn(move || {
                        if let Err(e) = handle_connection(stream) {
                            error!("Error handling connection: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }

        Ok(())
    }
}

/// Serve frames on one connection until the peer hangs up.
fn handle_connection(mut stream: UnixStream) -> Result<(), ServerError> {
    loop {
        let frame: RequestFrame = match read_frame(&mut stream) {
            Ok(frame) => frame,
            Err(e) if e.is_eof() => {
                debug!("Connection closed by peer");
                return Ok(());
            }
            Err(FrameError::Serialization(e)) => {
                // The length prefix was honoured, so the stream is still in sync.
                warn!("Malformed request: {}", e);
                let reply = ResponseFrame {
                    request_id: 0,
                    response: protocol_error(format!("malformed request: {}", e)),
                };
                write_frame(&mut stream, &reply)?;
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        debug!("Request: {}, id={}", frame.request.name(), frame.request_id);
        let response = handle_request(frame.request);

        let reply = ResponseFrame {
            request_id: frame.request_id,
            response,
        };
        write_frame(&mut stream, &reply)?;
    }
}

/// Answer a single request.
pub fn handle_request(request: Request) -> Response {
    match request {
        Request::GenerateKeys => handle_generate_keys(),
        Request::Sign(req) => handle_sign(req),
        Request::Verify(req) => handle_verify(req),
        Request::CreateApk { public_key } => handle_create_apk(&public_key),
        Request::AggregatePk(req) => handle_aggregate_pk(req),
        Request::AggregateSig(req) => handle_aggregate_sig(req),
        Request::Ping => Response::Pong,
    }
}

fn handle_generate_keys() -> Response {
    let mut sk = [0u8; native::SECRET_KEY_SIZE];
    let mut pk = [0u8; native::PUBLIC_KEY_SIZE];
    native::generate_keys(&mut sk, &mut pk);

    Response::Keys {
        secret_key: sk.to_vec(),
        public_key: pk.to_vec(),
    }
}

fn handle_sign(req: SignRequest) -> Response {
    let mut sig = [0u8; native::SIGNATURE_SIZE];
    match native::sign(&req.secret_key, &req.public_key, &req.message, &mut sig) {
        Status::Ok => Response::Signature(sig.to_vec()),
        status => status_error("sign", status),
    }
}

fn handle_verify(req: VerifyRequest) -> Response {
    match native::verify(&req.apk, &req.signature, &req.message) {
        Status::Ok => Response::Verify { valid: true },
        Status::VerificationFailed => Response::Verify { valid: false },
        status => status_error("verify", status),
    }
}

fn handle_create_apk(public_key: &[u8]) -> Response {
    let mut apk = [0u8; native::APK_SIZE];
    match native::create_apk(public_key, &mut apk) {
        Status::Ok => Response::Apk(apk.to_vec()),
        status => status_error("create_apk", status),
    }
}

fn handle_aggregate_pk(req: AggregatePkRequest) -> Response {
    if let Err(message) = check_count(req.keys.len(), req.count, native::PUBLIC_KEY_SIZE) {
        return invalid_input(message);
    }

    let mut apk = [0u8; native::APK_SIZE];
    match native::aggregate_pk(&req.apk, &req.keys, &mut apk) {
        Status::Ok => Response::Apk(apk.to_vec()),
        status => status_error("aggregate_pk", status),
    }
}

fn handle_aggregate_sig(req: AggregateSigRequest) -> Response {
    if let Err(message) = check_count(req.signatures.len(), req.count, native::SIGNATURE_SIZE) {
        return invalid_input(message);
    }

    let mut sig = [0u8; native::SIGNATURE_SIZE];
    match native::aggregate_sig(&req.signature, &req.signatures, &mut sig) {
        Status::Ok => Response::Signature(sig.to_vec()),
        status => status_error("aggregate_sig", status),
    }
}

/// The concatenated buffer must hold exactly `count` elements.
fn check_count(len: usize, count: u32, size: usize) -> Result<(), String> {
    let expected = count as usize * size;
    if len == expected {
        Ok(())
    } else {
        Err(format!(
            "expected {} elements of {} bytes ({} bytes), got {} bytes",
            count, size, expected, len
        ))
    }
}

fn status_error(op: &str, status: Status) -> Response {
    match status {
        Status::InvalidBytes => invalid_input(format!("{}: invalid bytes provided", op)),
        other => {
            error!("{} failed with status {:?}", op, other);
            Response::Error {
                kind: ErrorKind::Unknown,
                message: format!("{}: encountered unknown exit code {}", op, other.code()),
            }
        }
    }
}

fn invalid_input(message: String) -> Response {
    debug!("Rejecting request: {}", message);
    Response::Error {
        kind: ErrorKind::InvalidInput,
        message,
    }
}

fn protocol_error(message: String) -> Response {
    Response::Error {
        kind: ErrorKind::Protocol,
        message,
    }
}
