// SPDX-License-Identifier: MIT

//! §6.2 `/api/internal/runners/*` (coordinator-facing, DB-backed discovery)
//! and `/runner/sandboxes*` (runner-facing, backed by this process's own
//! local pool when `state.local_backend` is `Some`).

use crate::error::ApiError;
use crate::state::AppState;
use ash_backend::{CreateSandboxRequestDto, InterruptRequest, MarkRequest, MarkState, PersistRequest, SandboxHandleDto, SseFrame};
use ash_core::ids::{RunnerId, SandboxId};
use ash_core::runner::RunnerRecord;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::Json;
use futures_util::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;

#[derive(Deserialize)]
pub struct RegisterRunnerBody {
    pub id: RunnerId,
    pub host: String,
    pub port: u16,
    pub max_sandboxes: u32,
}

#[derive(Deserialize)]
pub struct HeartbeatBody {
    pub id: RunnerId,
    pub active_count: u32,
    pub warming_count: u32,
}

#[derive(Deserialize)]
pub struct DeregisterBody {
    pub id: RunnerId,
}

pub async fn register_runner(State(state): State<AppState>, Json(body): Json<RegisterRunnerBody>) -> Result<StatusCode, ApiError> {
    state.db.register_runner(body.id, &body.host, body.port, body.max_sandboxes).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn heartbeat_runner(State(state): State<AppState>, Json(body): Json<HeartbeatBody>) -> Result<StatusCode, ApiError> {
    state.db.heartbeat_runner(body.id, body.active_count, body.warming_count).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn deregister_runner(State(state): State<AppState>, Json(body): Json<DeregisterBody>) -> Result<StatusCode, ApiError> {
    ash_coordinator::registration::deregister(&state.db, body.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_runners(State(state): State<AppState>) -> Result<Json<Vec<RunnerRecord>>, ApiError> {
    Ok(Json(state.db.list_runners().await?))
}

fn local_backend(state: &AppState) -> Result<&std::sync::Arc<dyn ash_backend::RunnerBackend>, ApiError> {
    state.local_backend.as_ref().ok_or_else(|| ApiError::not_found("this process runs no local sandboxes"))
}

pub async fn create_sandbox(
    State(state): State<AppState>,
    Json(dto): Json<CreateSandboxRequestDto>,
) -> Result<(StatusCode, Json<SandboxHandleDto>), ApiError> {
    let backend = local_backend(&state)?;
    let handle = backend.create_sandbox(dto.into()).await?;
    Ok((StatusCode::CREATED, Json(handle.into())))
}

pub async fn destroy_sandbox(State(state): State<AppState>, Path(id): Path<SandboxId>) -> Result<StatusCode, ApiError> {
    let backend = local_backend(&state)?;
    backend.destroy_sandbox(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn send_command(
    State(state): State<AppState>,
    Path(id): Path<SandboxId>,
    Json(command): Json<ash_wire::Command>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let backend = local_backend(&state)?.clone();
    let mut rx = backend.send_command(id, &command).await?;

    let stream = async_stream::stream! {
        while let Some(bridge_event) = rx.recv().await {
            let frame: SseFrame = bridge_event.into();
            let data = serde_json::to_string(&frame).unwrap_or_else(|_| "{}".to_string());
            yield Ok(SseEvent::default().event("event").data(data));
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

pub async fn interrupt_sandbox(
    State(state): State<AppState>,
    Path(id): Path<SandboxId>,
    Json(body): Json<InterruptRequest>,
) -> Result<StatusCode, ApiError> {
    let backend = local_backend(&state)?;
    backend.interrupt(id, body.session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_sandbox(
    State(state): State<AppState>,
    Path(id): Path<SandboxId>,
    Json(body): Json<MarkRequest>,
) -> Result<StatusCode, ApiError> {
    let backend = local_backend(&state)?;
    match body.state {
        MarkState::Running => backend.mark_running(id).await?,
        MarkState::Waiting => backend.mark_waiting(id).await?,
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn persist_sandbox(
    State(state): State<AppState>,
    Path(id): Path<SandboxId>,
    Json(body): Json<PersistRequest>,
) -> Result<Json<ash_backend::PersistResponse>, ApiError> {
    let backend = local_backend(&state)?;
    let persisted = backend.persist_state(id, body.session_id, &body.agent_name).await;
    Ok(Json(ash_backend::PersistResponse { persisted }))
}

pub async fn runner_health(State(state): State<AppState>) -> Result<Json<ash_pool::PoolStats>, ApiError> {
    let backend = local_backend(&state)?;
    Ok(Json(backend.get_stats().await?))
}
