// SPDX-License-Identifier: MIT

use crate::config::Config;
use ash_backend::RunnerBackend;
use ash_core::clock::SystemClock;
use ash_coordinator::RunnerCoordinator;
use ash_db::Db;
use ash_router::SessionRouter;
use std::sync::Arc;

/// Shared state threaded through every handler (§6.1/§6.2). Cheap to
/// clone: every field is an `Arc` or an `Arc`-backed handle already.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Db,
    pub session_router: Arc<SessionRouter<SystemClock>>,
    pub coordinator: Arc<RunnerCoordinator<SystemClock>>,
    /// `Some` on any process that runs sandboxes locally (§6.2's
    /// `/runner/sandboxes*` surface); `None` on a pure `ASH_MODE=coordinator`
    /// process that only routes to remote runners.
    pub local_backend: Option<Arc<dyn RunnerBackend>>,
}
