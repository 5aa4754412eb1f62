// SPDX-License-Identifier: MIT

//! §6.1 `/api/agents`.

use crate::error::ApiError;
use crate::state::AppState;
use ash_core::agent::{Agent, DeployAgentRequest, AGENT_DESCRIPTOR_FILE};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

#[derive(Deserialize)]
pub struct DeployAgentBody {
    pub name: String,
    pub path: String,
}

pub async fn deploy_agent(
    State(state): State<AppState>,
    Json(body): Json<DeployAgentBody>,
) -> Result<(StatusCode, Json<Agent>), ApiError> {
    let path = std::path::PathBuf::from(&body.path);
    if !path.join(AGENT_DESCRIPTOR_FILE).is_file() {
        return Err(ApiError::invalid_state(format!(
            "no {AGENT_DESCRIPTOR_FILE} found at {}",
            path.display()
        )));
    }

    let agent = state
        .db
        .deploy_agent(&DeployAgentRequest { tenant_id: state.config.default_tenant_id, name: body.name, path })
        .await?;
    Ok((StatusCode::CREATED, Json(agent)))
}

pub async fn list_agents(State(state): State<AppState>) -> Result<Json<Vec<Agent>>, ApiError> {
    let agents = state.db.list_agents(state.config.default_tenant_id).await?;
    Ok(Json(agents))
}

pub async fn get_agent(State(state): State<AppState>, Path(name): Path<String>) -> Result<Json<Agent>, ApiError> {
    let agent = state
        .db
        .get_agent(state.config.default_tenant_id, &name)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("agent {name:?} not found")))?;
    Ok(Json(agent))
}

pub async fn delete_agent(State(state): State<AppState>, Path(name): Path<String>) -> Result<StatusCode, ApiError> {
    let deleted = state.db.delete_agent(state.config.default_tenant_id, &name).await?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("agent {name:?} not found")))
    }
}
