// SPDX-License-Identifier: MIT

use ash_core::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("sandbox pool at capacity and eviction could not free a slot")]
    CapacityReached,
    #[error("sandbox {0} not found")]
    NotFound(String),
    #[error(transparent)]
    Db(#[from] ash_db::DbError),
    #[error(transparent)]
    Sandbox(#[from] ash_sandbox::SandboxError),
}

impl Classify for PoolError {
    fn kind(&self) -> ErrorKind {
        match self {
            PoolError::CapacityReached => ErrorKind::CapacityReached,
            PoolError::NotFound(_) => ErrorKind::NotFound,
            PoolError::Db(err) => err.kind(),
            PoolError::Sandbox(err) => err.kind(),
        }
    }
}
