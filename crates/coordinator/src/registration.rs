// SPDX-License-Identifier: MIT

//! A runner's own self-registration/heartbeat (§4.7): writes directly to
//! the shared DB rather than looping a request back to its own HTTP
//! surface, since a colocated runner+coordinator process already holds a
//! `Db` handle. A runner reached only remotely still exposes the same
//! effect over `POST /api/internal/runners/{register,heartbeat,deregister}`
//! (§6.2), which `ash-server` wires straight to these same `Db` methods.

use ash_backend::RunnerBackend;
use ash_core::ids::RunnerId;
use ash_db::Db;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Identity this process advertises as a runner.
#[derive(Debug, Clone)]
pub struct RunnerSelfInfo {
    pub id: RunnerId,
    pub host: String,
    pub port: u16,
    pub max_sandboxes: u32,
}

/// Register once, then heartbeat `PoolStats`-derived counts on an interval
/// for the process lifetime (§4.7 "Runners POST /heartbeat every ~10 s").
pub async fn register(db: &Db, info: &RunnerSelfInfo) -> Result<(), ash_db::DbError> {
    db.register_runner(info.id, &info.host, info.port, info.max_sandboxes).await
}

pub fn spawn_heartbeat_loop(
    db: Db,
    info: RunnerSelfInfo,
    backend: Arc<dyn RunnerBackend>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let stats = match backend.get_stats().await {
                Ok(stats) => stats,
                Err(err) => {
                    warn!(runner_id = %info.id, error = %err, "failed to read local pool stats for heartbeat");
                    continue;
                }
            };
            let active = stats.histogram.active_count();
            let warming = stats.histogram.warming;
            if let Err(err) = db.heartbeat_runner(info.id, active, warming).await {
                warn!(runner_id = %info.id, error = %err, "failed to write runner heartbeat");
            }
        }
    })
}

/// Graceful shutdown counterpart to [`register`] (§4.7 "Graceful
/// deregister"): pause sessions bound here and drop the row, same as the
/// liveness sweep's `handleDeadRunner` path.
pub async fn deregister(db: &Db, runner_id: RunnerId) -> Result<(), ash_db::DbError> {
    db.pause_sessions_for_runner(runner_id).await?;
    db.delete_runner(runner_id).await?;
    Ok(())
}
