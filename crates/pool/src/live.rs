// SPDX-License-Identifier: MIT

//! The in-memory "live" entry (§3, §4.4): exists only while a sandbox's
//! state is `warming | warm | waiting | running`. Owned exclusively by the
//! pool.

use ash_core::ids::{SandboxId, SessionId, TenantId};
use ash_core::sandbox::SandboxState;
use ash_sandbox::{BridgeClient, SandboxHandle};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub struct LiveEntry {
    pub id: SandboxId,
    pub tenant_id: TenantId,
    pub handle: SandboxHandle,
    pub bridge: BridgeClient,
    pub state: SandboxState,
    /// `None` for unowned, pre-warmed sandboxes (§3).
    pub session_id: Option<SessionId>,
    pub agent_name: String,
    pub workspace_dir: PathBuf,
    /// Epoch milliseconds from the pool's `Clock` (§4.4's LRU ordering and
    /// idle-sweep comparisons are all against this, not wall-clock reads).
    pub last_used_at_ms: u64,
    /// Set from the disk monitor's `on_exceeded` callback (§4.2), which runs
    /// outside the pool and can't itself await a teardown. `get()` and the
    /// liveness sweep observe it and tear the sandbox down lazily.
    pub disk_exceeded: Arc<AtomicBool>,
}

/// The subset of a live entry useful to callers outside the pool (backend,
/// router): enough to address the sandbox and know where its files live,
/// without exposing the process handle or bridge socket.
#[derive(Debug, Clone)]
pub struct SandboxHandleInfo {
    pub sandbox_id: SandboxId,
    pub workspace_dir: PathBuf,
}

impl From<&LiveEntry> for SandboxHandleInfo {
    fn from(entry: &LiveEntry) -> Self {
        Self { sandbox_id: entry.id, workspace_dir: entry.workspace_dir.clone() }
    }
}
