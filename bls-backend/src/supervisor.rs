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

//! Lifecycle of the out-of-process signer.
//!
//! `connect` writes the service binary to disk, spawns it on the configured
//! socket and dials until a ping succeeds. `disconnect` closes the
//! connection, interrupts the child, waits for it and removes both
//! filesystem artifacts.
//!
//! A child that dies on its own is noticed the next time the state is
//! consulted: the session is dropped, the artifacts are removed and the
//! supervisor reports disconnected, so `connect` starts a fresh one.
//!
//! Two locks are involved. `lifecycle` serializes connect and disconnect
//! against each other; `state` guards the live session and is the only
//! lock an RPC takes, so calls made while a teardown is in progress fail
//! fast instead of queueing behind it.

use std::fs;
use std::io;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use bls_remote_signer::{ClientError, SignerClient};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn};

use crate::backoff::Backoff;
use crate::config::SupervisorConfig;
use crate::embedded::{EmbeddedBinary, Materialized};
use crate::error::{BackendError, SupervisorError};

const SPAWN_ATTEMPTS: u32 = 5;
const SPAWN_RETRY_DELAY: Duration = Duration::from_millis(20);
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

struct Session {
    child: Child,
    client: SignerClient,
}

enum State {
    Disconnected,
    Connected(Session),
}

/// Owns the signer child process and the connection to it.
pub struct Supervisor {
    config: SupervisorConfig,
    binary: EmbeddedBinary,
    lifecycle: Mutex<()>,
    state: Mutex<State>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig, binary: EmbeddedBinary) -> Self {
        Self {
            config,
            binary,
            lifecycle: Mutex::new(()),
            state: Mutex::new(State::Disconnected),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.prune_exited(&mut self.state.lock())
    }

    /// Pid of the running service, if connected.
    pub fn child_id(&self) -> Option<u32> {
        let mut state = self.state.lock();
        self.prune_exited(&mut state);
        match &*state {
            State::Connected(session) => Some(session.child.id()),
            State::Disconnected => None,
        }
    }

    /// Start the service and connect to it. A no-op when already connected.
    pub fn connect(&self) -> Result<(), SupervisorError> {
        let _lifecycle = self.lifecycle.lock();
        if self.is_connected() {
            debug!("Signer already connected");
            return Ok(());
        }

        match self.binary.materialize(&self.config.binary_path)? {
            Materialized::Written => {}
            Materialized::AlreadyPresent => {
                info!(
                    "Reusing existing signer binary at {:?}",
                    self.config.binary_path
                );
            }
        }

        let mut child = spawn_service(&self.config.binary_path, &self.config.socket_path)?;
        let pid = child.id();
        info!("Spawned signer pid {} on {:?}", pid, self.config.socket_path);

        let client = match self.dial(&mut child) {
            Ok(client) => client,
            Err(e) => {
                error!("Signer pid {} failed to come up: {}", pid, e);
                reap(&mut child);
                return Err(e);
            }
        };

        *self.state.lock() = State::Connected(Session { child, client });
        info!("Connected to signer pid {}", pid);
        Ok(())
    }

    /// Stop the service and remove its socket and binary. A no-op when not
    /// connected.
    pub fn disconnect(&self) -> Result<(), SupervisorError> {
        let _lifecycle = self.lifecycle.lock();
        let session = match std::mem::replace(&mut *self.state.lock(), State::Disconnected) {
            State::Connected(session) => session,
            State::Disconnected => {
                debug!("Signer already disconnected");
                return Ok(());
            }
        };

        let Session { mut child, client } = session;
        let pid = child.id();
        info!("Disconnecting from signer pid {}", pid);

        if let Err(e) = client.close() {
            warn!("Failed to close signer connection: {}", e);
        }

        let stopped = stop_child(&mut child, self.config.exit_timeout());
        self.remove_artifacts();

        let status = stopped?;
        info!("Signer pid {} exited with {}", pid, status);
        Ok(())
    }

    /// Run `f` against the live connection.
    pub(crate) fn with_client<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut SignerClient) -> Result<T, ClientError>,
    ) -> Result<T, BackendError> {
        let mut state = self.state.lock();
        self.prune_exited(&mut state);
        let State::Connected(session) = &mut *state else {
            warn!("{} called while signer is disconnected", op);
            return Err(BackendError::TransportUnavailable(format!(
                "{}: signer is not connected",
                op
            )));
        };

        match f(&mut session.client) {
            Ok(value) => Ok(value),
            Err(e) => {
                match &e {
                    ClientError::Service { .. } => debug!("{} rejected by signer: {}", op, e),
                    _ => {
                        warn!("{} failed to reach signer: {}", op, e);
                        self.prune_exited(&mut state);
                    }
                }
                Err(BackendError::from(e))
            }
        }
    }

    /// Drop the session if its child has exited, removing the artifacts it
    /// left behind. Returns whether a live session remains.
    fn prune_exited(&self, state: &mut State) -> bool {
        let State::Connected(session) = state else {
            return false;
        };
        let pid = session.child.id();
        let status = match session.child.try_wait() {
            Ok(None) => return true,
            Ok(Some(status)) => status,
            Err(e) => {
                warn!("Failed to poll signer pid {}: {}", pid, e);
                return true;
            }
        };

        error!("Signer pid {} exited unexpectedly with {}", pid, status);
        if let State::Connected(session) = std::mem::replace(state, State::Disconnected) {
            if let Err(e) = session.client.close() {
                debug!("Closing connection to exited signer: {}", e);
            }
        }
        self.remove_artifacts();
        false
    }

    /// Dial the socket with backoff until a ping succeeds, the child exits
    /// or the handshake timeout elapses.
    fn dial(&self, child: &mut Child) -> Result<SignerClient, SupervisorError> {
        let socket = &self.config.socket_path;
        let timeout = self.config.handshake_timeout();
        let mut backoff = Backoff::new(
            self.config.dial_backoff_base(),
            self.config.dial_backoff_max(),
        );
        let started = Instant::now();
        let mut last_error = String::from("no attempt made");

        loop {
            if let Ok(Some(status)) = child.try_wait() {
                return Err(SupervisorError::ChildExited(status));
            }

            let remaining = timeout.saturating_sub(started.elapsed());
            match handshake(socket, remaining) {
                Ok(client) => {
                    debug!(
                        "Handshake with signer succeeded after {} retries",
                        backoff.attempt()
                    );
                    return Ok(client);
                }
                Err(e) => {
                    trace!("Dial attempt {} failed: {}", backoff.attempt(), e);
                    last_error = e.to_string();
                }
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(SupervisorError::HandshakeTimeout {
                    socket: socket.clone(),
                    waited: elapsed,
                    last_error,
                });
            }
            thread::sleep(backoff.next_delay().min(timeout - elapsed));
        }
    }

    fn remove_artifacts(&self) {
        for path in [&self.config.socket_path, &self.config.binary_path] {
            match fs::remove_file(path) {
                Ok(()) => debug!("Removed {:?}", path),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!("{:?} already removed", path)
                }
                Err(e) => warn!("Failed to remove {:?}: {}", path, e),
            }
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        if let Err(e) = self.disconnect() {
            error!("Failed to stop signer on drop: {}", e);
        }
    }
}

fn spawn_service(binary: &Path, socket: &Path) -> Result<Child, SupervisorError> {
    let mut attempt = 1;
    loop {
        let spawned = Command::new(binary)
            .arg("--socket")
            .arg(socket)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn();

        match spawned {
            Ok(child) => return Ok(child),
            // A concurrent fork may still hold the freshly written binary open.
            Err(e) if e.raw_os_error() == Some(Errno::ETXTBSY as i32) && attempt < SPAWN_ATTEMPTS => {
                debug!("Signer binary busy, retrying spawn ({}/{})", attempt, SPAWN_ATTEMPTS);
                attempt += 1;
                thread::sleep(SPAWN_RETRY_DELAY);
            }
            Err(source) => {
                return Err(SupervisorError::Spawn {
                    path: binary.to_path_buf(),
                    source,
                })
            }
        }
    }
}

fn handshake(socket: &Path, remaining: Duration) -> Result<SignerClient, ClientError> {
    let mut client = SignerClient::connect(socket)?;
    // A zero timeout is rejected by the socket options.
    client.set_timeout(Some(remaining.max(Duration::from_millis(1))))?;
    client.ping()?;
    client.set_timeout(None)?;
    Ok(client)
}

/// Interrupt the child and wait up to `timeout` for it to exit, killing it
/// if it does not.
fn stop_child(child: &mut Child, timeout: Duration) -> Result<ExitStatus, SupervisorError> {
    let pid = child.id();
    if let Err(source) = kill(Pid::from_raw(pid as i32), Signal::SIGINT) {
        error!("Failed to send SIGINT to signer pid {}: {}", pid, source);
        reap(child);
        return Err(SupervisorError::Signal { pid, source });
    }

    let started = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {}
            Err(e) => warn!("Failed to poll signer pid {}: {}", pid, e),
        }

        let waited = started.elapsed();
        if waited >= timeout {
            error!("Signer pid {} ignored SIGINT for {:?}, killing", pid, waited);
            reap(child);
            return Err(SupervisorError::ExitTimeout { pid, waited });
        }
        thread::sleep(EXIT_POLL_INTERVAL);
    }
}

/// Kill and wait, logging rather than returning failures.
fn reap(child: &mut Child) {
    let pid = child.id();
    if let Err(e) = child.kill() {
        debug!("Kill of signer pid {} failed: {}", pid, e);
    }
    match child.wait() {
        Ok(status) => debug!("Reaped signer pid {}: {}", pid, status),
        Err(e) => warn!("Failed to reap signer pid {}: {}", pid, e),
    }
}
