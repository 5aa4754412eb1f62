// SPDX-License-Identifier: MIT

//! Errors surfaced across the `RunnerBackend` seam (§4.6/§4.7): whatever a
//! local pool call or a remote HTTP call can fail with, converged on the
//! same `ErrorKind` taxonomy the router classifies against.

use ash_core::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("sandbox {0} not found")]
    NotFound(String),
    #[error(transparent)]
    Pool(#[from] ash_pool::PoolError),
    #[error("runner request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("runner returned malformed event: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("runner responded with status {status}: {body}")]
    RunnerStatus { status: u16, body: String },
    #[error("timed out connecting to runner")]
    ConnectTimeout,
}

impl Classify for BackendError {
    fn kind(&self) -> ErrorKind {
        match self {
            BackendError::NotFound(_) => ErrorKind::NotFound,
            BackendError::Pool(err) => err.kind(),
            BackendError::Http(err) if err.is_timeout() => ErrorKind::ConnectTimeout,
            BackendError::Http(_) => ErrorKind::Internal,
            BackendError::Decode(_) => ErrorKind::DecodeError,
            BackendError::RunnerStatus { status: 503, .. } => ErrorKind::CapacityReached,
            BackendError::RunnerStatus { status: 404, .. } => ErrorKind::NotFound,
            BackendError::RunnerStatus { .. } => ErrorKind::Internal,
            BackendError::ConnectTimeout => ErrorKind::ConnectTimeout,
        }
    }
}
