// SPDX-License-Identifier: MIT

use ash_core::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("row not found")]
    NotFound,
    #[error("failed to decode row: {0}")]
    Decode(String),
}

impl Classify for DbError {
    fn kind(&self) -> ErrorKind {
        match self {
            DbError::NotFound => ErrorKind::NotFound,
            DbError::Sqlx(_) | DbError::Decode(_) => ErrorKind::Internal,
        }
    }
}
