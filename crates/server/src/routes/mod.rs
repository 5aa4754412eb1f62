// SPDX-License-Identifier: MIT

//! §6: route tables. Client routes sit under `/api` and check
//! `ASH_API_KEY`; runner-internal routes sit under `/api/internal` and
//! `/runner` and check `ASH_INTERNAL_SECRET`; `/health` and `/metrics` are
//! unauthenticated.

mod agents;
mod health;
mod runner_internal;
mod sessions;

use crate::auth;
use crate::state::AppState;
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    let client_routes = Router::new()
        .route("/api/agents", post(agents::deploy_agent).get(agents::list_agents))
        .route("/api/agents/:name", get(agents::get_agent).delete(agents::delete_agent))
        .route("/api/sessions", post(sessions::create_session).get(sessions::list_sessions))
        .route("/api/sessions/:id", get(sessions::get_session).delete(sessions::end_session))
        .route("/api/sessions/:id/messages", post(sessions::send_message))
        .route("/api/sessions/:id/pause", post(sessions::pause_session))
        .route("/api/sessions/:id/resume", post(sessions::resume_session))
        .route("/api/sessions/:id/fork", post(sessions::fork_session))
        .layer(middleware::from_fn_with_state(state.clone(), auth::require_api_key));

    let internal_routes = Router::new()
        .route("/api/internal/runners", get(runner_internal::list_runners))
        .route("/api/internal/runners/register", post(runner_internal::register_runner))
        .route("/api/internal/runners/heartbeat", post(runner_internal::heartbeat_runner))
        .route("/api/internal/runners/deregister", post(runner_internal::deregister_runner))
        .route("/runner/health", get(runner_internal::runner_health))
        .route("/runner/sandboxes", post(runner_internal::create_sandbox))
        .route("/runner/sandboxes/:id", delete(runner_internal::destroy_sandbox))
        .route("/runner/sandboxes/:id/cmd", post(runner_internal::send_command))
        .route("/runner/sandboxes/:id/interrupt", post(runner_internal::interrupt_sandbox))
        .route("/runner/sandboxes/:id/mark", post(runner_internal::mark_sandbox))
        .route("/runner/sandboxes/:id/persist", post(runner_internal::persist_sandbox))
        .layer(middleware::from_fn_with_state(state.clone(), auth::require_internal_secret));

    let public_routes = Router::new().route("/health", get(health::health)).route("/metrics", get(health::metrics));

    Router::new()
        .merge(client_routes)
        .merge(internal_routes)
        .merge(public_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
