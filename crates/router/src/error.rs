// SPDX-License-Identifier: MIT

use ash_core::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("agent not found")]
    AgentNotFound,
    #[error("session not found")]
    NotFound,
    #[error("session is not in a state that accepts this operation")]
    InvalidState,
    #[error("session has ended")]
    Ended,
    #[error(transparent)]
    Db(#[from] ash_db::DbError),
    #[error(transparent)]
    Backend(#[from] ash_backend::BackendError),
    #[error(transparent)]
    Coordinator(#[from] ash_coordinator::CoordinatorError),
    #[error(transparent)]
    Storage(#[from] ash_storage::StorageError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl Classify for RouterError {
    fn kind(&self) -> ErrorKind {
        match self {
            RouterError::AgentNotFound => ErrorKind::NotFound,
            RouterError::NotFound => ErrorKind::NotFound,
            RouterError::InvalidState => ErrorKind::InvalidState,
            RouterError::Ended => ErrorKind::InvalidState,
            RouterError::Db(err) => err.kind(),
            RouterError::Backend(err) => err.kind(),
            RouterError::Coordinator(err) => err.kind(),
            RouterError::Storage(_) => ErrorKind::Internal,
            RouterError::Internal(_) => ErrorKind::Internal,
        }
    }
}
