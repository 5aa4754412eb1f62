// SPDX-License-Identifier: MIT

//! `LocalRunnerBackend` (§4.6): a thin wrapper around a [`SandboxPool`]
//! that implements [`RunnerBackend`], plus the workspace snapshot/cloud-sync
//! side of `persistState` (§4.5).

use crate::error::BackendError;
use crate::trait_def::{RunnerBackend, SandboxHandle};
use ash_core::clock::Clock;
use ash_core::ids::{SandboxId, SessionId};
use ash_core::sandbox::CreateSandboxRequest;
use ash_pool::{PoolStats, SandboxPool};
use ash_sandbox::BridgeEvent;
use ash_storage::CloudStore;
use ash_wire::Command;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

pub struct LocalRunnerBackend<C: Clock + 'static> {
    pool: Arc<SandboxPool<C>>,
    data_dir: PathBuf,
    cloud: Option<Arc<dyn CloudStore>>,
}

impl<C: Clock + 'static> LocalRunnerBackend<C> {
    pub fn new(pool: Arc<SandboxPool<C>>, data_dir: PathBuf, cloud: Option<Arc<dyn CloudStore>>) -> Self {
        Self { pool, data_dir, cloud }
    }

    pub fn pool(&self) -> &Arc<SandboxPool<C>> {
        &self.pool
    }
}

#[async_trait]
impl<C: Clock + 'static> RunnerBackend for LocalRunnerBackend<C> {
    async fn create_sandbox(&self, req: CreateSandboxRequest) -> Result<SandboxHandle, BackendError> {
        Ok(self.pool.create(req).await?)
    }

    async fn destroy_sandbox(&self, id: SandboxId) -> Result<(), BackendError> {
        Ok(self.pool.destroy(id).await?)
    }

    async fn send_command(
        &self,
        id: SandboxId,
        command: &Command,
    ) -> Result<mpsc::Receiver<BridgeEvent>, BackendError> {
        Ok(self.pool.send_command(id, command).await?)
    }

    async fn interrupt(&self, id: SandboxId, session_id: SessionId) -> Result<(), BackendError> {
        Ok(self.pool.send_fire_and_forget(id, &Command::Interrupt { session_id }).await?)
    }

    async fn get_sandbox(&self, id: SandboxId) -> Result<Option<SandboxHandle>, BackendError> {
        Ok(self.pool.get(id).await)
    }

    async fn is_sandbox_alive(&self, id: SandboxId) -> bool {
        self.pool.is_alive(id).await
    }

    async fn mark_running(&self, id: SandboxId) -> Result<(), BackendError> {
        Ok(self.pool.mark_running(id)?)
    }

    async fn mark_waiting(&self, id: SandboxId) -> Result<(), BackendError> {
        Ok(self.pool.mark_waiting(id)?)
    }

    async fn persist_state(&self, id: SandboxId, session_id: SessionId, agent_name: &str) -> bool {
        let Some(handle) = self.pool.get(id).await else {
            return false;
        };
        let session_id_str = session_id.to_string();
        if let Err(err) =
            ash_storage::persist_session_state(&self.data_dir, &session_id_str, &handle.workspace_dir, agent_name)
                .await
        {
            warn!(sandbox_id = %id, error = %err, "failed to persist session workspace snapshot");
            return false;
        }

        if let Some(cloud) = self.cloud.clone() {
            let workspace_dir = handle.workspace_dir.clone();
            let bundle = tokio::task::spawn_blocking(move || ash_storage::build_bundle(&workspace_dir)).await;
            match bundle {
                Ok(Ok(bytes)) => {
                    if let Err(err) = cloud.upload(&session_id_str, bytes).await {
                        warn!(sandbox_id = %id, error = %err, "failed to upload session snapshot to cloud store");
                    }
                }
                Ok(Err(err)) => {
                    warn!(sandbox_id = %id, error = %err, "failed to build snapshot bundle for cloud upload")
                }
                Err(err) => warn!(sandbox_id = %id, error = %err, "snapshot bundle task panicked"),
            }
        }

        true
    }

    fn record_cold_local_hit(&self) {
        self.pool.record_cold_local_hit();
    }

    fn record_cold_cloud_hit(&self) {
        self.pool.record_cold_cloud_hit();
    }

    fn record_cold_fresh_hit(&self) {
        self.pool.record_cold_fresh_hit();
    }

    fn record_warm_hit(&self) {
        self.pool.record_warm_hit();
    }

    async fn get_stats(&self) -> Result<PoolStats, BackendError> {
        Ok(self.pool.stats().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash_core::clock::FakeClock;
    use ash_core::ids::SandboxId;
    use ash_db::Db;
    use ash_pool::{noop_hook, PoolConfig};
    use ash_sandbox::{SandboxRuntime, SandboxRuntimeConfig};
    use std::time::Duration;
    use tempfile::tempdir;

    async fn test_backend(base: &std::path::Path) -> LocalRunnerBackend<FakeClock> {
        let db = Db::connect("sqlite::memory:").await.unwrap();
        let runtime = SandboxRuntime::new(SandboxRuntimeConfig {
            sandboxes_dir: base.join("sandboxes"),
            data_dir: base.join("data"),
            bridge_entry: PathBuf::from("/bin/true"),
            socket_connect_timeout: Duration::from_millis(50),
            disk_poll_interval: Duration::from_secs(3600),
        });
        let pool = Arc::new(SandboxPool::new(
            db,
            runtime,
            FakeClock::new(),
            PoolConfig { owner_host: "host-1".into(), ..Default::default() },
            noop_hook(),
            Duration::from_millis(50),
        ));
        LocalRunnerBackend::new(pool, base.join("data"), None)
    }

    #[tokio::test]
    async fn get_sandbox_returns_none_for_unknown_id() {
        let dir = tempdir().unwrap();
        let backend = test_backend(dir.path()).await;
        assert!(backend.get_sandbox(SandboxId::new()).await.unwrap().is_none());
        assert!(!backend.is_sandbox_alive(SandboxId::new()).await);
    }

    #[tokio::test]
    async fn persist_state_is_false_for_unknown_sandbox() {
        let dir = tempdir().unwrap();
        let backend = test_backend(dir.path()).await;
        let persisted = backend.persist_state(SandboxId::new(), SessionId::new(), "agent-a").await;
        assert!(!persisted);
    }

    #[tokio::test]
    async fn destroy_unknown_sandbox_is_idempotent() {
        let dir = tempdir().unwrap();
        let backend = test_backend(dir.path()).await;
        assert!(backend.destroy_sandbox(SandboxId::new()).await.is_ok());
    }

    #[tokio::test]
    async fn record_hits_do_not_panic_and_reach_stats() {
        let dir = tempdir().unwrap();
        let backend = test_backend(dir.path()).await;
        backend.record_cold_local_hit();
        backend.record_cold_cloud_hit();
        backend.record_cold_fresh_hit();
        backend.record_warm_hit();
        let stats = backend.get_stats().await.unwrap();
        assert_eq!(stats.resume_cold_hits, 3);
        assert_eq!(stats.resume_warm_hits, 1);
    }
}
