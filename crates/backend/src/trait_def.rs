// SPDX-License-Identifier: MIT

//! `RunnerBackend` (§4.6): the uniform surface the router and coordinator
//! consume over "sandboxes live on this host" ([`crate::LocalRunnerBackend`])
//! and "sandboxes live on another host" ([`crate::RemoteRunnerBackend`]).

use crate::error::BackendError;
use ash_core::ids::{SandboxId, SessionId};
use ash_core::sandbox::CreateSandboxRequest;
use ash_pool::{PoolStats, SandboxHandleInfo};
use ash_sandbox::BridgeEvent;
use ash_wire::Command;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// A sandbox's address: enough for a caller to know it exists and where its
/// files live, without exposing a process handle or socket (§4.6).
pub type SandboxHandle = SandboxHandleInfo;

#[async_trait]
pub trait RunnerBackend: Send + Sync {
    /// Allocate a new sandbox; may evict to make room; may fail with
    /// `capacity_reached`.
    async fn create_sandbox(&self, req: CreateSandboxRequest) -> Result<SandboxHandle, BackendError>;

    /// Tear down. Idempotent: a sandbox that is already gone is not an
    /// error.
    async fn destroy_sandbox(&self, id: SandboxId) -> Result<(), BackendError>;

    /// As in §4.3: one event stream per in-flight command.
    async fn send_command(
        &self,
        id: SandboxId,
        command: &Command,
    ) -> Result<mpsc::Receiver<BridgeEvent>, BackendError>;

    /// Fire-and-forget cancellation of the in-flight command. `session_id`
    /// is threaded through from the caller (the router always has it)
    /// since the wire `Interrupt` command carries it, not the sandbox id.
    async fn interrupt(&self, id: SandboxId, session_id: SessionId) -> Result<(), BackendError>;

    /// `None` means unknown or dead.
    async fn get_sandbox(&self, id: SandboxId) -> Result<Option<SandboxHandle>, BackendError>;

    /// Local checks process exit; remote treats cache presence as proof
    /// (§4.6).
    async fn is_sandbox_alive(&self, id: SandboxId) -> bool;

    /// Must complete without yielding on the local path so it is observable
    /// to the idle sweeper before the sweeper can run (§4.4, §5).
    async fn mark_running(&self, id: SandboxId) -> Result<(), BackendError>;

    async fn mark_waiting(&self, id: SandboxId) -> Result<(), BackendError>;

    /// Best-effort; returns whether the persist actually happened.
    async fn persist_state(&self, id: SandboxId, session_id: SessionId, agent_name: &str) -> bool;

    fn record_cold_local_hit(&self);
    fn record_cold_cloud_hit(&self);
    fn record_cold_fresh_hit(&self);
    fn record_warm_hit(&self);

    async fn get_stats(&self) -> Result<PoolStats, BackendError>;
}
