// SPDX-License-Identifier: MIT

//! Pool counters and the snapshot surfaced by `getStats()` (§4.4, §4.6).

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters accumulated over the pool's lifetime. Cheap to update
/// from any async context without a lock (§4.4's counters are read-mostly,
/// written from a handful of call sites).
#[derive(Default)]
pub struct Counters {
    pub resume_warm_hits: AtomicU64,
    pub resume_cold_local_hits: AtomicU64,
    pub resume_cold_cloud_hits: AtomicU64,
    pub resume_cold_fresh_hits: AtomicU64,
    pub pre_warm_hits: AtomicU64,
}

impl Counters {
    pub fn record_warm_hit(&self) {
        self.resume_warm_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cold_local_hit(&self) {
        self.resume_cold_local_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cold_cloud_hit(&self) {
        self.resume_cold_cloud_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cold_fresh_hit(&self) {
        self.resume_cold_fresh_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pre_warm_hit(&self) {
        self.pre_warm_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// `resumeColdHits` is the sum of its three sub-counters (§4.4).
    pub fn resume_cold_hits(&self) -> u64 {
        self.resume_cold_local_hits.load(Ordering::Relaxed)
            + self.resume_cold_cloud_hits.load(Ordering::Relaxed)
            + self.resume_cold_fresh_hits.load(Ordering::Relaxed)
    }
}

/// Count of live entries in each non-`cold` state (§3).
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct StateHistogram {
    pub warming: u32,
    pub warm: u32,
    pub waiting: u32,
    pub running: u32,
}

impl StateHistogram {
    /// `activeCount` as consumed by `RunnerRecord`/coordinator selection
    /// (§4.7): bound, non-warming live sandboxes.
    pub fn active_count(&self) -> u32 {
        self.warm + self.waiting + self.running
    }
}

/// A point-in-time snapshot of pool state (§4.6 `getStats()`).
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct PoolStats {
    pub histogram: StateHistogram,
    pub cold_count: u64,
    pub resume_warm_hits: u64,
    pub resume_cold_hits: u64,
    pub resume_cold_local_hits: u64,
    pub resume_cold_cloud_hits: u64,
    pub resume_cold_fresh_hits: u64,
    pub pre_warm_hits: u64,
}
