// SPDX-License-Identifier: MIT

//! Sandbox: an isolated child process plus its workspace (§3, §4.2).

use crate::ids::{AgentId, SandboxId, SessionId, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Sandbox process state machine (§3).
///
/// The DB row is canonical; an in-memory "live" pool entry only exists for
/// `Warming | Warm | Waiting | Running`. `Cold` means no live process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxState {
    Cold,
    Warming,
    Warm,
    Waiting,
    Running,
}

impl SandboxState {
    /// Whether a live in-memory pool entry should exist for this state.
    pub fn is_live(self) -> bool {
        !matches!(self, SandboxState::Cold)
    }

    /// Eviction candidacy tier, lower sorts first (§4.4): cold, then
    /// waiting, then warm. `Running`/`Warming` are never eviction
    /// candidates.
    pub fn eviction_tier(self) -> Option<u8> {
        match self {
            SandboxState::Cold => Some(0),
            SandboxState::Waiting => Some(1),
            SandboxState::Warm => Some(2),
            SandboxState::Running | SandboxState::Warming => None,
        }
    }
}

impl std::fmt::Display for SandboxState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SandboxState::Cold => "cold",
            SandboxState::Warming => "warming",
            SandboxState::Warm => "warm",
            SandboxState::Waiting => "waiting",
            SandboxState::Running => "running",
        };
        write!(f, "{s}")
    }
}

/// Resource limits applied to a sandbox process (§4.2). Defaults match the
/// spec's stated `{2048, 100, 1024, 64}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub memory_mb: u64,
    pub cpu_percent: u32,
    pub disk_mb: u64,
    pub max_processes: u32,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self { memory_mb: 2048, cpu_percent: 100, disk_mb: 1024, max_processes: 64 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sandbox {
    pub id: SandboxId,
    pub tenant_id: TenantId,
    /// `None` for unowned, pre-warmed sandboxes.
    pub session_id: Option<SessionId>,
    pub agent_name: String,
    pub state: SandboxState,
    pub workspace_dir: PathBuf,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

impl Sandbox {
    pub fn new_warming(
        id: SandboxId,
        tenant_id: TenantId,
        agent_name: impl Into<String>,
        workspace_dir: PathBuf,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            tenant_id,
            session_id: None,
            agent_name: agent_name.into(),
            state: SandboxState::Warming,
            workspace_dir,
            created_at: now,
            last_used_at: now,
        }
    }
}

/// All agent identity required to spin up or recreate a sandbox (§4.2).
#[derive(Debug, Clone)]
pub struct CreateSandboxRequest {
    pub id: SandboxId,
    pub tenant_id: TenantId,
    pub agent_id: AgentId,
    pub agent_name: String,
    pub agent_dir: PathBuf,
    pub session_id: Option<SessionId>,
    pub skip_agent_copy: bool,
    pub limits: ResourceLimits,
    pub extra_env: Vec<(String, String)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eviction_tier_orders_cold_before_waiting_before_warm() {
        assert!(SandboxState::Cold.eviction_tier() < SandboxState::Waiting.eviction_tier());
        assert!(SandboxState::Waiting.eviction_tier() < SandboxState::Warm.eviction_tier());
    }

    #[test]
    fn running_and_warming_are_never_eviction_candidates() {
        assert_eq!(SandboxState::Running.eviction_tier(), None);
        assert_eq!(SandboxState::Warming.eviction_tier(), None);
    }

    #[test]
    fn default_limits_match_spec_table() {
        let limits = ResourceLimits::default();
        assert_eq!(limits.memory_mb, 2048);
        assert_eq!(limits.cpu_percent, 100);
        assert_eq!(limits.disk_mb, 1024);
        assert_eq!(limits.max_processes, 64);
    }
}
