// SPDX-License-Identifier: MIT

use ash_core::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("no runners available and no local backend configured")]
    NoRunnersAvailable,
    #[error(transparent)]
    Db(#[from] ash_db::DbError),
    #[error(transparent)]
    Backend(#[from] ash_backend::BackendError),
}

impl Classify for CoordinatorError {
    fn kind(&self) -> ErrorKind {
        match self {
            CoordinatorError::NoRunnersAvailable => ErrorKind::NoRunnersAvailable,
            CoordinatorError::Db(err) => err.kind(),
            CoordinatorError::Backend(err) => err.kind(),
        }
    }
}
