// SPDX-License-Identifier: MIT

use ash_core::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a gzip stream (bad magic bytes)")]
    NotGzip,
    #[error("decompressed bundle exceeds {0} bytes")]
    TooLarge(u64),
    #[error("bundle entry {0:?} escapes the extraction target directory")]
    PathEscape(std::path::PathBuf),
    #[error("cloud store error: {0}")]
    Cloud(#[source] object_store::Error),
    #[error("unsupported or malformed snapshot url: {0}")]
    InvalidUrl(String),
}

impl Classify for StorageError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Internal
    }
}
