// SPDX-License-Identifier: MIT

//! Pool tuning knobs (§4.4, §6.5).

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// `ASH_MAX_SANDBOXES`.
    pub max_sandboxes: u32,
    /// `ASH_IDLE_TIMEOUT_MS`: how long a `waiting` sandbox may sit before
    /// the idle sweep evicts it. Default 5 minutes (§4.4).
    pub idle_timeout_ms: u64,
    /// How often the idle sweep runs. Default 5 minutes (§4.4).
    pub idle_sweep_interval: Duration,
    /// How long a `cold` row may sit before the cold-cleanup sweep deletes
    /// it and best-effort removes its workspace dir.
    pub cold_cleanup_ttl_ms: u64,
    /// How often the cold-cleanup sweep runs.
    pub cold_cleanup_interval: Duration,
    /// Identifies this host's rows in the shared `sandboxes` table
    /// (`owner_host`), distinct from any fleet-wide `RunnerId` (§4.4).
    pub owner_host: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_sandboxes: 64,
            idle_timeout_ms: 5 * 60 * 1000,
            idle_sweep_interval: Duration::from_secs(5 * 60),
            cold_cleanup_ttl_ms: 60 * 60 * 1000,
            cold_cleanup_interval: Duration::from_secs(5 * 60),
            owner_host: "default".to_string(),
        }
    }
}
