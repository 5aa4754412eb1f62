// SPDX-License-Identifier: MIT

//! Wire DTOs shared by `ash-server`'s runner-internal HTTP surface (§6.2)
//! and [`crate::RemoteRunnerBackend`]'s client of it. Neither
//! `CreateSandboxRequest` nor `BridgeEvent` carry `serde` impls (they're
//! in-process types in `ash-core`/`ash-sandbox`), so these are the
//! serializable mirrors that cross the wire between runners.

use ash_core::ids::{AgentId, SandboxId, SessionId, TenantId};
use ash_core::sandbox::{CreateSandboxRequest, ResourceLimits};
use ash_sandbox::BridgeEvent;
use ash_wire::Event;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSandboxRequestDto {
    pub id: SandboxId,
    pub tenant_id: TenantId,
    pub agent_id: AgentId,
    pub agent_name: String,
    pub agent_dir: PathBuf,
    pub session_id: Option<SessionId>,
    pub skip_agent_copy: bool,
    pub limits: ResourceLimits,
    pub extra_env: Vec<(String, String)>,
}

impl From<CreateSandboxRequest> for CreateSandboxRequestDto {
    fn from(req: CreateSandboxRequest) -> Self {
        Self {
            id: req.id,
            tenant_id: req.tenant_id,
            agent_id: req.agent_id,
            agent_name: req.agent_name,
            agent_dir: req.agent_dir,
            session_id: req.session_id,
            skip_agent_copy: req.skip_agent_copy,
            limits: req.limits,
            extra_env: req.extra_env,
        }
    }
}

impl From<CreateSandboxRequestDto> for CreateSandboxRequest {
    fn from(dto: CreateSandboxRequestDto) -> Self {
        Self {
            id: dto.id,
            tenant_id: dto.tenant_id,
            agent_id: dto.agent_id,
            agent_name: dto.agent_name,
            agent_dir: dto.agent_dir,
            session_id: dto.session_id,
            skip_agent_copy: dto.skip_agent_copy,
            limits: dto.limits,
            extra_env: dto.extra_env,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxHandleDto {
    pub sandbox_id: SandboxId,
    pub workspace_dir: PathBuf,
}

impl From<ash_pool::SandboxHandleInfo> for SandboxHandleDto {
    fn from(handle: ash_pool::SandboxHandleInfo) -> Self {
        Self { sandbox_id: handle.sandbox_id, workspace_dir: handle.workspace_dir }
    }
}

impl From<SandboxHandleDto> for ash_pool::SandboxHandleInfo {
    fn from(dto: SandboxHandleDto) -> Self {
        Self { sandbox_id: dto.sandbox_id, workspace_dir: dto.workspace_dir }
    }
}

/// One SSE record's `data:` payload for `POST /runner/sandboxes/<id>/cmd`
/// (§4.7 "parses events of form `event: <name>\n data: <json>\n\n`").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SseFrame {
    Event(Event),
    DecodeError { error: String },
    /// Mirrors `BridgeEvent::PeerClosed` (§4.3, §7 `peer_closed`) across the
    /// runner-internal HTTP hop, distinct from `DecodeError` since the two
    /// have opposite effects on the stream (one ends it, one doesn't).
    PeerClosed,
}

impl From<BridgeEvent> for SseFrame {
    fn from(event: BridgeEvent) -> Self {
        match event {
            BridgeEvent::Event(e) => SseFrame::Event(e),
            BridgeEvent::DecodeError(err) => SseFrame::DecodeError { error: err },
            BridgeEvent::PeerClosed => SseFrame::PeerClosed,
        }
    }
}

impl From<SseFrame> for BridgeEvent {
    fn from(frame: SseFrame) -> Self {
        match frame {
            SseFrame::Event(e) => BridgeEvent::Event(e),
            SseFrame::DecodeError { error } => BridgeEvent::DecodeError(error),
            SseFrame::PeerClosed => BridgeEvent::PeerClosed,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkState {
    Running,
    Waiting,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkRequest {
    pub state: MarkState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistRequest {
    pub session_id: SessionId,
    pub agent_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistResponse {
    pub persisted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterruptRequest {
    pub session_id: SessionId,
}
