// SPDX-License-Identifier: MIT

//! `RunnerCoordinator` (§4.7): the scheduler across the fleet. Discovery is
//! purely DB-driven; the only in-memory state here is a local connection
//! cache of already-constructed remote backends, safe to lose and rebuild
//! at any time.

use crate::error::CoordinatorError;
use ash_backend::{RemoteRunnerBackend, RunnerBackend};
use ash_core::clock::{Clock, SystemClock};
use ash_core::ids::RunnerId;
use ash_core::runner::RunnerRecord;
use ash_db::Db;
use chrono::Duration as ChronoDuration;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Everything [`RunnerCoordinator::select_backend`] hands back: which
/// backend to use, and the `runnerId` the caller should persist onto the
/// session (`None` for local, per `ash_core::session::Session::runner_id`'s
/// own convention).
pub struct Selected {
    pub runner_id: Option<RunnerId>,
    pub backend: Arc<dyn RunnerBackend>,
}

pub struct RunnerCoordinator<C: Clock = SystemClock> {
    db: Db,
    clock: C,
    local_backend: Option<Arc<dyn RunnerBackend>>,
    internal_secret: Option<String>,
    liveness_timeout: ChronoDuration,
    backends: Mutex<HashMap<RunnerId, Arc<dyn RunnerBackend>>>,
}

impl<C: Clock> RunnerCoordinator<C> {
    pub fn new(
        db: Db,
        clock: C,
        local_backend: Option<Arc<dyn RunnerBackend>>,
        internal_secret: Option<String>,
        liveness_timeout: ChronoDuration,
    ) -> Self {
        Self { db, clock, local_backend, internal_secret, liveness_timeout, backends: Mutex::new(HashMap::new()) }
    }

    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::from_timestamp_millis(self.clock.epoch_ms() as i64).unwrap_or_else(chrono::Utc::now)
    }

    /// §4.7 selection: of the alive runners, pick the one with the largest
    /// positive free capacity; otherwise fall back to the local backend if
    /// one is configured; otherwise `no_runners_available`.
    pub async fn select_backend(&self) -> Result<Selected, CoordinatorError> {
        let candidates = self.db.list_alive_runners(self.now(), self.liveness_timeout).await?;
        let best = candidates.into_iter().filter(|r| r.free_capacity() > 0).max_by_key(|r| r.free_capacity());

        if let Some(runner) = best {
            let backend = self.backend_for_record(&runner);
            return Ok(Selected { runner_id: Some(runner.id), backend });
        }

        match &self.local_backend {
            Some(backend) => Ok(Selected { runner_id: None, backend: backend.clone() }),
            None => Err(CoordinatorError::NoRunnersAvailable),
        }
    }

    /// §4.7 routing for an already-bound session: `None` (or the local
    /// sentinel) means local; otherwise cache-or-construct a remote
    /// backend from the DB row.
    pub async fn get_backend_for_runner_async(
        &self,
        runner_id: Option<RunnerId>,
    ) -> Result<Arc<dyn RunnerBackend>, CoordinatorError> {
        let Some(runner_id) = runner_id else {
            return self.local_backend.clone().ok_or(CoordinatorError::NoRunnersAvailable);
        };

        if let Some(cached) = self.backends.lock().get(&runner_id).cloned() {
            return Ok(cached);
        }

        let Some(record) = self.db.get_runner(runner_id).await? else {
            return Err(CoordinatorError::NoRunnersAvailable);
        };
        Ok(self.backend_for_record(&record))
    }

    fn backend_for_record(&self, runner: &RunnerRecord) -> Arc<dyn RunnerBackend> {
        let mut backends = self.backends.lock();
        if let Some(existing) = backends.get(&runner.id) {
            return existing.clone();
        }
        let base_url = format!("http://{}:{}", runner.host, runner.port);
        let backend: Arc<dyn RunnerBackend> = match RemoteRunnerBackend::new(base_url, self.internal_secret.clone())
        {
            Ok(backend) => Arc::new(backend),
            Err(err) => {
                // Building the HTTP client itself failing is effectively
                // unreachable (no network I/O happens yet), but surfacing
                // this as "no backend available" is safer than panicking.
                warn!(runner_id = %runner.id, error = %err, "failed to construct remote runner backend");
                return Arc::new(UnreachableBackend);
            }
        };
        backends.insert(runner.id, backend.clone());
        backend
    }

    /// §4.7 `handleDeadRunner`: pause every session bound to this runner,
    /// then drop its row. Idempotent across any number of concurrent
    /// coordinators racing the same dead runner.
    pub async fn handle_dead_runner(&self, runner_id: RunnerId) -> Result<(), CoordinatorError> {
        let paused = self.db.pause_sessions_for_runner(runner_id).await?;
        self.db.delete_runner(runner_id).await?;
        self.backends.lock().remove(&runner_id);
        if paused > 0 {
            info!(runner_id = %runner_id, paused, "paused sessions bound to dead runner");
        }
        Ok(())
    }

    /// §4.7 graceful deregister: same pause-then-delete, invoked explicitly
    /// by a runner shutting down rather than discovered by the sweep.
    pub async fn deregister_runner(&self, runner_id: RunnerId) -> Result<(), CoordinatorError> {
        self.handle_dead_runner(runner_id).await
    }

    /// §4.7 liveness sweep: every `liveness_timeout`, find stale runners and
    /// hand each to `handle_dead_runner`.
    pub async fn sweep_once(&self) -> Result<(), CoordinatorError> {
        let now = self.now();
        for runner in self.db.list_runners().await? {
            if !runner.is_alive(now, self.liveness_timeout) {
                self.handle_dead_runner(runner.id).await?;
            }
        }
        Ok(())
    }
}

impl<C: Clock + Send + Sync + 'static> RunnerCoordinator<C> {
    /// Run [`Self::sweep_once`] on a timer for the process lifetime.
    pub fn spawn_liveness_sweep(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(err) = coordinator.sweep_once().await {
                    warn!(error = %err, "runner liveness sweep failed");
                }
            }
        })
    }
}

/// Placeholder returned only when constructing an HTTP client itself fails
/// (malformed TLS config, exhausted resources); every call errors instead
/// of silently succeeding.
struct UnreachableBackend;

#[async_trait::async_trait]
impl RunnerBackend for UnreachableBackend {
    async fn create_sandbox(
        &self,
        _req: ash_core::sandbox::CreateSandboxRequest,
    ) -> Result<ash_backend::SandboxHandle, ash_backend::BackendError> {
        Err(ash_backend::BackendError::NotFound("unreachable runner backend".into()))
    }

    async fn destroy_sandbox(&self, _id: ash_core::ids::SandboxId) -> Result<(), ash_backend::BackendError> {
        Ok(())
    }

    async fn send_command(
        &self,
        _id: ash_core::ids::SandboxId,
        _command: &ash_wire::Command,
    ) -> Result<tokio::sync::mpsc::Receiver<ash_sandbox::BridgeEvent>, ash_backend::BackendError> {
        Err(ash_backend::BackendError::NotFound("unreachable runner backend".into()))
    }

    async fn interrupt(
        &self,
        _id: ash_core::ids::SandboxId,
        _session_id: ash_core::ids::SessionId,
    ) -> Result<(), ash_backend::BackendError> {
        Ok(())
    }

    async fn get_sandbox(
        &self,
        _id: ash_core::ids::SandboxId,
    ) -> Result<Option<ash_backend::SandboxHandle>, ash_backend::BackendError> {
        Ok(None)
    }

    async fn is_sandbox_alive(&self, _id: ash_core::ids::SandboxId) -> bool {
        false
    }

    async fn mark_running(&self, _id: ash_core::ids::SandboxId) -> Result<(), ash_backend::BackendError> {
        Err(ash_backend::BackendError::NotFound("unreachable runner backend".into()))
    }

    async fn mark_waiting(&self, _id: ash_core::ids::SandboxId) -> Result<(), ash_backend::BackendError> {
        Err(ash_backend::BackendError::NotFound("unreachable runner backend".into()))
    }

    async fn persist_state(
        &self,
        _id: ash_core::ids::SandboxId,
        _session_id: ash_core::ids::SessionId,
        _agent_name: &str,
    ) -> bool {
        false
    }

    fn record_cold_local_hit(&self) {}
    fn record_cold_cloud_hit(&self) {}
    fn record_cold_fresh_hit(&self) {}
    fn record_warm_hit(&self) {}

    async fn get_stats(&self) -> Result<ash_pool::PoolStats, ash_backend::BackendError> {
        Err(ash_backend::BackendError::NotFound("unreachable runner backend".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash_core::clock::FakeClock;
    use chrono::Duration as ChronoDuration;

    async fn test_db() -> Db {
        Db::connect("sqlite::memory:").await.unwrap()
    }

    fn coordinator(db: Db, clock: FakeClock, local: Option<Arc<dyn RunnerBackend>>) -> RunnerCoordinator<FakeClock> {
        RunnerCoordinator::new(db, clock, local, None, ChronoDuration::seconds(10))
    }

    #[tokio::test]
    async fn select_backend_falls_back_to_local_when_no_runners_registered() {
        let db = test_db().await;
        let clock = FakeClock::new();
        let local: Arc<dyn RunnerBackend> = Arc::new(UnreachableBackend);
        let coord = coordinator(db, clock, Some(local));

        let selected = coord.select_backend().await.unwrap();
        assert!(selected.runner_id.is_none());
    }

    #[tokio::test]
    async fn select_backend_errors_with_no_local_and_no_runners() {
        let db = test_db().await;
        let clock = FakeClock::new();
        let coord = coordinator(db, clock, None);

        let err = coord.select_backend().await.unwrap_err();
        assert!(matches!(err, CoordinatorError::NoRunnersAvailable));
    }

    #[tokio::test]
    async fn select_backend_picks_alive_runner_with_most_free_capacity() {
        let db = test_db().await;
        let clock = FakeClock::new();
        let now = chrono::DateTime::from_timestamp_millis(clock.epoch_ms() as i64).unwrap();

        let low_capacity = RunnerId::new();
        db.register_runner(low_capacity, "10.0.0.1", 9001, 4).await.unwrap();
        db.heartbeat_runner(low_capacity, 3, 0).await.unwrap();

        let high_capacity = RunnerId::new();
        db.register_runner(high_capacity, "10.0.0.2", 9001, 10).await.unwrap();
        db.heartbeat_runner(high_capacity, 1, 0).await.unwrap();
        let _ = now;

        let coord = coordinator(db, clock, None);
        let selected = coord.select_backend().await.unwrap();
        assert_eq!(selected.runner_id, Some(high_capacity));
    }

    #[tokio::test]
    async fn stale_runner_is_excluded_from_selection() {
        let db = test_db().await;
        let clock = FakeClock::new();

        let runner = RunnerId::new();
        db.register_runner(runner, "10.0.0.1", 9001, 10).await.unwrap();
        db.heartbeat_runner(runner, 0, 0).await.unwrap();

        clock.advance(Duration::from_secs(60));
        let coord = coordinator(db, clock, None);

        let err = coord.select_backend().await.unwrap_err();
        assert!(matches!(err, CoordinatorError::NoRunnersAvailable));
    }

    #[tokio::test]
    async fn handle_dead_runner_pauses_bound_sessions_and_deletes_row() {
        use ash_core::ids::TenantId;
        use ash_core::session::{Session, SessionStatus};

        let db = test_db().await;
        let runner = RunnerId::new();
        db.register_runner(runner, "10.0.0.1", 9001, 10).await.unwrap();

        let mut session = Session::new_starting("agent-a", TenantId::new(), chrono::Utc::now());
        session.runner_id = Some(runner);
        session.status = SessionStatus::Active;
        db.insert_session(&session).await.unwrap();

        let clock = FakeClock::new();
        let coord = coordinator(db, clock, None);
        coord.handle_dead_runner(runner).await.unwrap();

        let fetched = coord.db.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, SessionStatus::Paused);
        assert!(coord.db.get_runner(runner).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn handle_dead_runner_is_idempotent() {
        let db = test_db().await;
        let runner = RunnerId::new();
        let clock = FakeClock::new();
        let coord = coordinator(db, clock, None);

        coord.handle_dead_runner(runner).await.unwrap();
        coord.handle_dead_runner(runner).await.unwrap();
    }

    #[tokio::test]
    async fn get_backend_for_runner_async_uses_local_when_none() {
        let db = test_db().await;
        let clock = FakeClock::new();
        let local: Arc<dyn RunnerBackend> = Arc::new(UnreachableBackend);
        let coord = coordinator(db, clock, Some(local));

        let backend = coord.get_backend_for_runner_async(None).await.unwrap();
        assert!(backend.get_sandbox(ash_core::ids::SandboxId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_backend_for_runner_async_errors_for_unknown_runner() {
        let db = test_db().await;
        let clock = FakeClock::new();
        let coord = coordinator(db, clock, None);

        let err = coord.get_backend_for_runner_async(Some(RunnerId::new())).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::NoRunnersAvailable));
    }
}
