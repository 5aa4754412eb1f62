// SPDX-License-Identifier: MIT

//! RunnerRecord: a host that can own sandboxes (§3).

use crate::ids::RunnerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunnerRecord {
    pub id: RunnerId,
    pub host: String,
    pub port: u16,
    pub max_sandboxes: u32,
    pub active_count: u32,
    pub warming_count: u32,
    pub last_heartbeat_at: DateTime<Utc>,
}

impl RunnerRecord {
    /// A record is alive iff its heartbeat is within `liveness_window` of
    /// `now` (§3, §4.7).
    pub fn is_alive(&self, now: DateTime<Utc>, liveness_window: chrono::Duration) -> bool {
        now - self.last_heartbeat_at <= liveness_window
    }

    /// Free capacity used by the coordinator's selection rule (§4.7): the
    /// runner with the largest `max_sandboxes - active - warming` wins.
    pub fn free_capacity(&self) -> i64 {
        self.max_sandboxes as i64 - self.active_count as i64 - self.warming_count as i64
    }
}
