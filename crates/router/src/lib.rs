// SPDX-License-Identifier: MIT

//! The session router (§4.8): owns session lifecycle and maps requests onto
//! backends chosen by [`ash_coordinator::RunnerCoordinator`]. Nothing here
//! talks to a sandbox directly — that's [`ash_backend::RunnerBackend`]'s
//! job; the router only sequences calls to it and persists the result.

mod config;
mod error;
mod message;
mod session_ops;

pub use config::RouterConfig;
pub use error::RouterError;
pub use message::RouterSseEvent;

use ash_core::clock::{Clock, SystemClock};
use ash_coordinator::RunnerCoordinator;
use ash_db::Db;
use ash_storage::CloudStore;
use std::sync::Arc;

/// Wires a `Db`, a `RunnerCoordinator`, and optional cloud snapshot sync
/// into the session-lifecycle operations of §4.8.
pub struct SessionRouter<C: Clock = SystemClock> {
    db: Db,
    coordinator: Arc<RunnerCoordinator<C>>,
    cloud: Option<Arc<dyn CloudStore>>,
    config: RouterConfig,
}

impl<C: Clock> SessionRouter<C> {
    pub fn new(
        db: Db,
        coordinator: Arc<RunnerCoordinator<C>>,
        cloud: Option<Arc<dyn CloudStore>>,
        config: RouterConfig,
    ) -> Self {
        Self { db, coordinator, cloud, config }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash_backend::LocalRunnerBackend;
    use ash_core::agent::DeployAgentRequest;
    use ash_core::clock::FakeClock;
    use ash_core::ids::TenantId;
    use ash_core::session::SessionStatus;
    use ash_pool::{noop_hook, PoolConfig, SandboxPool};
    use ash_sandbox::{SandboxRuntime, SandboxRuntimeConfig};
    use chrono::Duration as ChronoDuration;
    use std::time::Duration;
    use tempfile::tempdir;

    async fn test_router() -> (SessionRouter<FakeClock>, tempfile::TempDir, TenantId, String) {
        let db = Db::connect("sqlite::memory:").await.unwrap();
        let data_dir = tempdir().unwrap();
        let sandboxes_dir = tempdir().unwrap();
        let agent_dir = tempdir().unwrap();
        tokio::fs::write(agent_dir.path().join("CLAUDE.md"), "# agent-a").await.unwrap();

        let clock = FakeClock::new();
        let runtime = SandboxRuntime::new(SandboxRuntimeConfig {
            sandboxes_dir: sandboxes_dir.path().to_path_buf(),
            data_dir: data_dir.path().to_path_buf(),
            bridge_entry: std::path::PathBuf::from("/bin/true"),
            socket_connect_timeout: Duration::from_millis(50),
            disk_poll_interval: Duration::from_secs(3600),
        });
        let pool_config = PoolConfig { owner_host: "test-host".to_string(), ..PoolConfig::default() };
        let pool = Arc::new(SandboxPool::new(
            db.clone(),
            runtime,
            clock.clone(),
            pool_config,
            noop_hook(),
            Duration::from_millis(50),
        ));
        let local_backend: Arc<dyn ash_backend::RunnerBackend> =
            Arc::new(LocalRunnerBackend::new(pool, data_dir.path().to_path_buf(), None));

        let coordinator = Arc::new(RunnerCoordinator::new(
            db.clone(),
            clock,
            Some(local_backend),
            None,
            ChronoDuration::seconds(30),
        ));

        let tenant_id = TenantId::new();
        db.deploy_agent(&DeployAgentRequest {
            tenant_id,
            name: "agent-a".to_string(),
            path: agent_dir.path().to_path_buf(),
        })
        .await
        .unwrap();

        let router_config = RouterConfig::new(data_dir.path().to_path_buf());
        let router = SessionRouter::new(db, coordinator, None, router_config);
        (router, data_dir, tenant_id, "agent-a".to_string())
    }

    #[tokio::test]
    async fn create_session_requires_a_deployed_agent() {
        let (router, _data_dir, tenant_id, _agent_name) = test_router().await;
        let err = router.create_session(tenant_id, "missing-agent").await.unwrap_err();
        assert!(matches!(err, RouterError::AgentNotFound));
    }

    #[tokio::test]
    async fn pause_rejects_non_active_session() {
        let (router, _data_dir, tenant_id, agent_name) = test_router().await;
        let session = ash_core::session::Session::new_starting(agent_name, tenant_id, chrono::Utc::now());
        router.db.insert_session(&session).await.unwrap();

        let err = router.pause(tenant_id, session.id).await.unwrap_err();
        assert!(matches!(err, RouterError::InvalidState));
    }

    #[tokio::test]
    async fn resume_rejects_ended_session() {
        let (router, _data_dir, tenant_id, agent_name) = test_router().await;
        let mut session = ash_core::session::Session::new_starting(agent_name, tenant_id, chrono::Utc::now());
        session.status = SessionStatus::Ended;
        router.db.insert_session(&session).await.unwrap();

        let err = router.resume(tenant_id, session.id).await.unwrap_err();
        assert!(matches!(err, RouterError::Ended));
    }

    #[tokio::test]
    async fn fork_inherits_agent_and_gets_a_fresh_id() {
        let (router, _data_dir, tenant_id, agent_name) = test_router().await;
        let parent = ash_core::session::Session::new_starting(agent_name.clone(), tenant_id, chrono::Utc::now());
        router.db.insert_session(&parent).await.unwrap();

        let child = router.fork(tenant_id, parent.id).await.unwrap();
        assert_ne!(child.id, parent.id);
        assert_eq!(child.agent_name, agent_name);
        assert_eq!(child.parent_session_id, Some(parent.id));
        assert_eq!(child.status, SessionStatus::Starting);
    }

    #[tokio::test]
    async fn send_message_rejects_non_active_session() {
        let (router, _data_dir, tenant_id, agent_name) = test_router().await;
        let session = ash_core::session::Session::new_starting(agent_name, tenant_id, chrono::Utc::now());
        router.db.insert_session(&session).await.unwrap();

        let err = router.send_message(tenant_id, session.id, "hi".to_string(), None).await.unwrap_err();
        assert!(matches!(err, RouterError::InvalidState));
    }
}
