// SPDX-License-Identifier: MIT

use ash_core::sandbox::ResourceLimits;
use std::path::PathBuf;
use std::time::Duration;

/// §4.8/§5 tunables for [`crate::SessionRouter`], distinct from
/// [`ash_pool::PoolConfig`] (which governs one host's in-memory pool).
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Where session snapshots live (`<dataDir>/sessions/<id>/workspace`),
    /// shared with whatever `ash-pool`/`ash-backend` instance runs locally.
    pub data_dir: PathBuf,
    /// §4.8 "SSE backpressure": bound on how long a write may wait for the
    /// client to drain before the stream is closed as `client_write_timeout`.
    pub sse_write_timeout: Duration,
    /// Resource limits applied to every sandbox this router creates.
    pub default_limits: ResourceLimits,
}

impl RouterConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir, sse_write_timeout: Duration::from_secs(30), default_limits: ResourceLimits::default() }
    }
}
