// SPDX-License-Identifier: MIT

//! §6.1 `/api/sessions`, including the one streaming endpoint in the whole
//! surface: `POST /api/sessions/<id>/messages`.

use crate::error::ApiError;
use crate::state::AppState;
use ash_core::ids::SessionId;
use ash_core::session::Session;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::Json;
use futures_util::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;

#[derive(Deserialize)]
pub struct CreateSessionBody {
    pub agent: String,
}

#[derive(Deserialize)]
pub struct SendMessageBody {
    pub content: String,
    #[serde(default)]
    pub include_partial_messages: Option<bool>,
}

#[derive(Deserialize)]
pub struct ListSessionsQuery {
    pub agent: Option<String>,
}

pub async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionBody>,
) -> Result<(StatusCode, Json<Session>), ApiError> {
    let session = state.session_router.create_session(state.config.default_tenant_id, &body.agent).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<Vec<Session>>, ApiError> {
    let sessions = state.db.list_sessions(state.config.default_tenant_id, query.agent.as_deref()).await?;
    Ok(Json(sessions))
}

pub async fn get_session(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Session>, ApiError> {
    let session = state
        .db
        .get_session_scoped(state.config.default_tenant_id, SessionId::from_string(id))
        .await?
        .ok_or_else(ApiError::session_not_found)?;
    Ok(Json(session))
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<SendMessageBody>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let session_id = SessionId::from_string(id);
    let mut rx = state
        .session_router
        .send_message(state.config.default_tenant_id, session_id, body.content, body.include_partial_messages)
        .await?;

    let stream = async_stream::stream! {
        while let Some(frame) = rx.recv().await {
            let event = SseEvent::default()
                .event(frame.event_name())
                .json_data(frame.data())
                .unwrap_or_else(|_| SseEvent::default().event("error").data("{\"error\":\"encode_error\"}"));
            yield Ok(event);
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

pub async fn pause_session(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    state.session_router.pause(state.config.default_tenant_id, SessionId::from_string(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn resume_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    let session = state.session_router.resume(state.config.default_tenant_id, SessionId::from_string(id)).await?;
    Ok(Json(session))
}

pub async fn end_session(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    state.session_router.end(state.config.default_tenant_id, SessionId::from_string(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn fork_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Session>), ApiError> {
    let child = state.session_router.fork(state.config.default_tenant_id, SessionId::from_string(id)).await?;
    Ok((StatusCode::CREATED, Json(child)))
}
