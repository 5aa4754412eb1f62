// SPDX-License-Identifier: MIT

//! `BridgeClient` (§4.3): owns the client end of a sandbox's local socket,
//! connects with retry, and demultiplexes inbound events to the currently
//! active command's stream.
//!
//! Modeled per §9 as two tasks (reader, writer) joined by a bounded channel
//! of events per active command; cancellation closes the channel by
//! dropping the receiver.

use crate::SandboxError;
use ash_wire::{Command, Event, Reassembler};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// An event surfaced to callers of [`BridgeClient::send_command`]: either a
/// decoded bridge event, or a malformed line surfaced as a `decode_error`
/// that does not kill the stream (§4.1, §7).
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    Event(Event),
    DecodeError(String),
    /// The bridge process closed the socket mid-stream (§4.3, §7
    /// `peer_closed`): distinct from [`Self::DecodeError`], which is
    /// recovered locally and does not end the stream.
    PeerClosed,
}

struct Shared {
    write_half: Mutex<tokio::net::unix::OwnedWriteHalf>,
    /// The channel for the currently in-flight command, if any. Only one
    /// command may be in flight per client (§4.3 concurrency).
    active_tx: Mutex<Option<mpsc::Sender<BridgeEvent>>>,
}

/// Client end of one sandbox's bridge socket. Cheap to clone (both fields
/// are `Arc`s) so the pool can hand a handle to a command caller without
/// holding its own lock across the send.
#[derive(Clone)]
pub struct BridgeClient {
    shared: std::sync::Arc<Shared>,
    closed: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

impl BridgeClient {
    /// Poll `socket_path` until connectable, up to `timeout` (default ~5s
    /// per §4.3), then spawn the background reader task.
    pub async fn connect(socket_path: &Path, timeout: Duration) -> Result<Self, SandboxError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let stream = loop {
            match UnixStream::connect(socket_path).await {
                Ok(stream) => break stream,
                Err(_) if tokio::time::Instant::now() < deadline => {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                Err(_) => {
                    return Err(SandboxError::ConnectTimeout {
                        path: socket_path.to_string_lossy().into_owned(),
                        timeout_ms: timeout.as_millis() as u64,
                    })
                }
            }
        };

        let (read_half, write_half) = stream.into_split();
        let shared = std::sync::Arc::new(Shared {
            write_half: Mutex::new(write_half),
            active_tx: Mutex::new(None),
        });
        let closed = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));

        spawn_reader(read_half, shared.clone(), closed.clone(), socket_path.to_path_buf());

        Ok(Self { shared, closed })
    }

    /// Send a `query`/`interrupt`/`shutdown` command. Returns a bounded
    /// receiver that yields events until `done`, `error`, peer close, or
    /// the caller drops the receiver (cancellation).
    pub async fn send_command(&self, command: &Command) -> Result<mpsc::Receiver<BridgeEvent>, SandboxError> {
        if self.closed.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(SandboxError::NotConnected);
        }
        let (tx, rx) = mpsc::channel(64);
        *self.shared.active_tx.lock().await = Some(tx);

        let encoded = ash_wire::encode_line(command).map_err(|_| SandboxError::NotConnected)?;
        let mut write_half = self.shared.write_half.lock().await;
        write_half.write_all(&encoded).await.map_err(|_| SandboxError::NotConnected)?;
        Ok(rx)
    }

    /// Fire-and-forget send, for `interrupt` (§4.3).
    pub async fn send_fire_and_forget(&self, command: &Command) -> Result<(), SandboxError> {
        if self.closed.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(SandboxError::NotConnected);
        }
        let encoded = ash_wire::encode_line(command).map_err(|_| SandboxError::NotConnected)?;
        let mut write_half = self.shared.write_half.lock().await;
        write_half.write_all(&encoded).await.map_err(|_| SandboxError::NotConnected)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(std::sync::atomic::Ordering::SeqCst)
    }
}

fn spawn_reader(
    mut read_half: tokio::net::unix::OwnedReadHalf,
    shared: std::sync::Arc<Shared>,
    closed: std::sync::Arc<std::sync::atomic::AtomicBool>,
    socket_path: PathBuf,
) {
    tokio::spawn(async move {
        let mut reassembler = Reassembler::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = match read_half.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            for line in reassembler.push(&buf[..n]) {
                let bridge_event = match line {
                    ash_wire::ReassembledLine::Event(event) => BridgeEvent::Event(event),
                    ash_wire::ReassembledLine::DecodeError(raw) => BridgeEvent::DecodeError(raw),
                };
                let is_terminal = matches!(&bridge_event, BridgeEvent::Event(e) if e.is_terminal());

                let mut active = shared.active_tx.lock().await;
                if let Some(tx) = active.as_ref() {
                    let _ = tx.send(bridge_event).await;
                }
                if is_terminal {
                    *active = None;
                }
            }
        }
        debug!(socket = %socket_path.display(), "bridge peer closed");
        closed.store(true, std::sync::atomic::Ordering::SeqCst);
        // Peer closed mid-stream: any in-flight command ends with peer_closed.
        if let Some(tx) = shared.active_tx.lock().await.take() {
            let _ = tx.send(BridgeEvent::PeerClosed).await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash_core::SessionId;
    use tempfile::tempdir;
    use tokio::net::UnixListener;

    async fn spawn_echo_bridge(socket_path: PathBuf) {
        let listener = UnixListener::bind(&socket_path).unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let event = Event::Done { session_id: SessionId::from_string("ses-a") };
            let encoded = ash_wire::encode_line(&event).unwrap();
            // drain the incoming command line before replying
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf).await;
            let _ = stream.write_all(&encoded).await;
        });
    }

    #[tokio::test]
    async fn send_command_yields_events_until_done() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("bridge.sock");
        spawn_echo_bridge(socket_path.clone()).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let client = BridgeClient::connect(&socket_path, Duration::from_secs(1)).await.unwrap();
        let mut rx = client
            .send_command(&Command::Query {
                session_id: SessionId::from_string("ses-a"),
                prompt: "hi".into(),
                include_partial_messages: None,
            })
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event, BridgeEvent::Event(Event::Done { session_id: SessionId::from_string("ses-a") }));
    }

    #[tokio::test]
    async fn connect_times_out_when_nothing_listens() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("nobody-here.sock");
        let result = BridgeClient::connect(&socket_path, Duration::from_millis(100)).await;
        assert!(matches!(result, Err(SandboxError::ConnectTimeout { .. })));
    }

    #[tokio::test]
    async fn peer_close_surfaces_as_decode_error_signal_and_marks_closed() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("bridge.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let client = BridgeClient::connect(&socket_path, Duration::from_secs(1)).await.unwrap();
        let mut rx = client
            .send_command(&Command::Query {
                session_id: SessionId::from_string("ses-a"),
                prompt: "hi".into(),
                include_partial_messages: None,
            })
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event, BridgeEvent::PeerClosed);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(client.is_closed());
    }
}
