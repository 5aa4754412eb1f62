// SPDX-License-Identifier: MIT

//! `ashd` entrypoint (§5): numbered startup sequence in the daemon's own
//! style, then serve until a shutdown signal, then drain gracefully.

use ash_backend::{LocalRunnerBackend, RunnerBackend};
use ash_core::clock::SystemClock;
use ash_core::ids::SessionId;
use ash_core::SessionStatus;
use ash_coordinator::registration::{self, RunnerSelfInfo};
use ash_coordinator::RunnerCoordinator;
use ash_db::Db;
use ash_pool::{BeforeEvictHook, EvictionContext, PoolConfig, SandboxPool};
use ash_router::{RouterConfig, SessionRouter};
use ash_sandbox::{SandboxPaths, SandboxRuntime, SandboxRuntimeConfig};
use ash_server::config::{Config, Mode};
use ash_server::state::AppState;
use ash_storage::CloudStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// The pool's pre-eviction callback (§4.4), fired just before a sandbox is
/// torn down by capacity eviction, idle sweep, or a detected crash/OOM
/// (§4.2, §7 `oom`): best-effort snapshot the workspace, then flip the
/// bound session to `paused` so a later resume takes the cold path instead
/// of finding `active` pointing at a dead sandbox.
fn before_evict_hook(
    db: Db,
    data_dir: PathBuf,
    sandboxes_dir: PathBuf,
    cloud: Option<Arc<dyn CloudStore>>,
) -> BeforeEvictHook {
    Arc::new(move |ctx: EvictionContext| {
        let db = db.clone();
        let data_dir = data_dir.clone();
        let sandboxes_dir = sandboxes_dir.clone();
        let cloud = cloud.clone();
        Box::pin(async move {
            let Some(session_id) = ctx.session_id else { return };
            persist_and_pause(&db, &data_dir, &sandboxes_dir, cloud.as_ref(), ctx.sandbox_id.as_str(), session_id)
                .await;
        })
    })
}

async fn persist_and_pause(
    db: &Db,
    data_dir: &Path,
    sandboxes_dir: &Path,
    cloud: Option<&Arc<dyn CloudStore>>,
    sandbox_id: &str,
    session_id: SessionId,
) {
    let session = match db.get_session(session_id).await {
        Ok(Some(session)) => session,
        Ok(None) => return,
        Err(err) => {
            warn!(%session_id, %err, "before-evict: failed to load session");
            return;
        }
    };

    let workspace_dir = SandboxPaths::new(sandboxes_dir, sandbox_id).workspace;
    match ash_storage::persist_session_state(data_dir, session_id.as_str(), &workspace_dir, &session.agent_name).await
    {
        Ok(()) => {
            if let Some(cloud) = cloud.cloned() {
                upload_snapshot(cloud, workspace_dir, session_id).await;
            }
        }
        Err(err) => warn!(%session_id, %err, "before-evict: failed to persist session workspace snapshot"),
    }

    if let Err(err) = db.update_session_status(session_id, SessionStatus::Paused).await {
        warn!(%session_id, %err, "before-evict: failed to mark session paused");
    }
}

async fn upload_snapshot(cloud: Arc<dyn CloudStore>, workspace_dir: PathBuf, session_id: SessionId) {
    let bundle = tokio::task::spawn_blocking(move || ash_storage::build_bundle(&workspace_dir)).await;
    match bundle {
        Ok(Ok(bytes)) => {
            if let Err(err) = cloud.upload(session_id.as_str(), bytes).await {
                warn!(%session_id, %err, "before-evict: failed to upload session snapshot to cloud store");
            }
        }
        Ok(Err(err)) => warn!(%session_id, %err, "before-evict: failed to build snapshot bundle for cloud upload"),
        Err(err) => warn!(%session_id, %err, "before-evict: snapshot bundle task panicked"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env();

    // 1. Data directory, ahead of anything that touches disk.
    std::fs::create_dir_all(&config.data_dir)?;
    info!(data_dir = %config.data_dir.display(), mode = ?config.mode, "starting ashd");

    // 2. Database.
    let db = Db::connect(&config.database_url).await?;

    // 3. Cloud snapshot store, if configured.
    let cloud = ash_storage::parse_snapshot_url(config.snapshot_url.as_deref())?;

    // 4. Local sandbox pool, only in standalone mode.
    let local_backend: Option<Arc<dyn RunnerBackend>> = if config.mode == Mode::Standalone {
        let sandboxes_dir = config.data_dir.join("sandboxes");
        let runtime = SandboxRuntime::new(SandboxRuntimeConfig {
            sandboxes_dir: sandboxes_dir.clone(),
            data_dir: config.data_dir.clone(),
            bridge_entry: config.bridge_entry.clone(),
            socket_connect_timeout: Duration::from_secs(5),
            disk_poll_interval: Duration::from_millis(200),
        });
        let pool_config = PoolConfig {
            max_sandboxes: config.max_sandboxes,
            idle_timeout_ms: config.idle_timeout_ms,
            owner_host: config.runner_id.to_string(),
            ..PoolConfig::default()
        };
        // The hook is built from `db`/`data_dir`/`cloud` alone, so it needs
        // no back-reference to the router built in step 6.
        let hook = before_evict_hook(db.clone(), config.data_dir.clone(), sandboxes_dir, cloud.clone());
        let pool = Arc::new(SandboxPool::new(db.clone(), runtime, SystemClock, pool_config, hook, Duration::from_secs(5)));
        pool.init().await?;
        pool.spawn_background_tasks();
        Some(Arc::new(LocalRunnerBackend::new(pool, config.data_dir.clone(), cloud.clone())))
    } else {
        None
    };

    // 5. Coordinator: DB-driven discovery across the fleet, local backend as
    //    the standalone fallback.
    let coordinator = Arc::new(RunnerCoordinator::new(
        db.clone(),
        SystemClock,
        local_backend.clone(),
        config.internal_secret.clone(),
        config.liveness_timeout(),
    ));
    coordinator.spawn_liveness_sweep(Duration::from_secs(30));

    // 6. Session router, sitting on top of the coordinator.
    let router_config = RouterConfig::new(config.data_dir.clone());
    let session_router = Arc::new(SessionRouter::new(db.clone(), coordinator.clone(), cloud, router_config));

    // 7. Self-registration, only in standalone mode: this process is both
    //    the one HTTP surface and one of the runners behind it.
    let self_info = (config.mode == Mode::Standalone).then(|| RunnerSelfInfo {
        id: config.runner_id,
        host: config.runner_advertise_host.clone(),
        port: config.runner_port,
        max_sandboxes: config.max_sandboxes,
    });
    if let (Some(info), Some(backend)) = (&self_info, &local_backend) {
        registration::register(&db, info).await?;
        registration::spawn_heartbeat_loop(db.clone(), info.clone(), backend.clone(), config.heartbeat_interval());
    }

    // 8. Build and serve. Binding last, once everything behind the routes
    //    is ready, mirrors the daemon's own "bind last" ordering.
    let config = Arc::new(config);
    let state = AppState { config: config.clone(), db: db.clone(), session_router, coordinator, local_backend };
    let app = ash_server::build_router(state);

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!(host = %config.host, port = config.port, "listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    // 9. Graceful deregister on the way out.
    if let Some(info) = self_info {
        info!(runner_id = %info.id, "deregistering before exit");
        registration::deregister(&db, info.id).await.ok();
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async { tokio::signal::ctrl_c().await.ok() };

    #[cfg(unix)]
    let terminate = async {
        let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        signal.recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received, draining");
}
