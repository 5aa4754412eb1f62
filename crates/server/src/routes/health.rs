// SPDX-License-Identifier: MIT

//! §6.1 unauthenticated `/health` and `/metrics`. No pack repo carries a
//! Prometheus client crate, and this surface is a handful of gauges, so the
//! text exposition format is written by hand rather than reached for one.

use crate::state::AppState;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, StatusCode> {
    let mut runner_rows = String::new();
    if let Ok(runners) = state.db.list_runners().await {
        for runner in runners {
            runner_rows.push_str(&format!(
                "ash_runner_active_sandboxes{{runner_id=\"{}\"}} {}\n",
                runner.id, runner.active_count
            ));
            runner_rows.push_str(&format!(
                "ash_runner_warming_sandboxes{{runner_id=\"{}\"}} {}\n",
                runner.id, runner.warming_count
            ));
        }
    }

    let mut pool_section = String::new();
    if let Some(backend) = &state.local_backend {
        if let Ok(stats) = backend.get_stats().await {
            pool_section.push_str(&format!("ash_pool_warming {}\n", stats.histogram.warming));
            pool_section.push_str(&format!("ash_pool_warm {}\n", stats.histogram.warm));
            pool_section.push_str(&format!("ash_pool_waiting {}\n", stats.histogram.waiting));
            pool_section.push_str(&format!("ash_pool_running {}\n", stats.histogram.running));
            pool_section.push_str(&format!("ash_pool_cold {}\n", stats.cold_count));
            pool_section.push_str(&format!("ash_pool_resume_warm_hits_total {}\n", stats.resume_warm_hits));
            pool_section.push_str(&format!("ash_pool_resume_cold_hits_total {}\n", stats.resume_cold_hits));
            pool_section.push_str(&format!("ash_pool_pre_warm_hits_total {}\n", stats.pre_warm_hits));
        }
    }

    let body = format!(
        "# HELP ash_runner_active_sandboxes Active sandboxes reported by each runner's last heartbeat.\n\
         # TYPE ash_runner_active_sandboxes gauge\n\
         # HELP ash_runner_warming_sandboxes Warming sandboxes reported by each runner's last heartbeat.\n\
         # TYPE ash_runner_warming_sandboxes gauge\n\
         {runner_rows}\
         # HELP ash_pool_warm Sandbox pool state histogram (this process's local pool only).\n\
         # TYPE ash_pool_warm gauge\n\
         {pool_section}"
    );

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
