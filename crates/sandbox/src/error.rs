// SPDX-License-Identifier: MIT

use ash_core::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to prepare sandbox directory: {0}")]
    Layout(#[source] std::io::Error),
    #[error("failed to spawn bridge process: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("bridge socket {path} not connectable after {timeout_ms}ms")]
    ConnectTimeout { path: String, timeout_ms: u64 },
    #[error("bridge client is not connected")]
    NotConnected,
    #[error("peer closed the bridge socket")]
    PeerClosed,
    #[error("sandbox isolation setup failed: {0}")]
    Isolation(String),
    #[error("resource limit setup failed: {0}")]
    Limits(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Classify for SandboxError {
    fn kind(&self) -> ErrorKind {
        match self {
            SandboxError::ConnectTimeout { .. } => ErrorKind::ConnectTimeout,
            SandboxError::PeerClosed => ErrorKind::PeerClosed,
            SandboxError::NotConnected
            | SandboxError::Layout(_)
            | SandboxError::Spawn(_)
            | SandboxError::Isolation(_)
            | SandboxError::Limits(_)
            | SandboxError::Io(_) => ErrorKind::Internal,
        }
    }
}
