// SPDX-License-Identifier: MIT

//! `RemoteRunnerBackend` (§4.7): an HTTP client to another runner's
//! internal surface (§6.2). `sendCommand` posts to `.../cmd` and parses the
//! SSE response; every other operation is a plain request/response.
//!
//! `isSandboxAlive`/`getSandbox` never make a network call: per §4.6,
//! remote treats local cache presence as proof of life. A sandbox is
//! inserted into the cache on a successful `create_sandbox` and removed on
//! `destroy_sandbox`; real death is discovered by the coordinator's
//! liveness sweep over heartbeats, not per-sandbox polling.

use crate::error::BackendError;
use crate::frame::{
    CreateSandboxRequestDto, InterruptRequest, MarkRequest, MarkState, PersistRequest, PersistResponse,
    SandboxHandleDto, SseFrame,
};
use crate::trait_def::{RunnerBackend, SandboxHandle};
use ash_core::ids::{SandboxId, SessionId};
use ash_core::sandbox::CreateSandboxRequest;
use ash_pool::PoolStats;
use ash_sandbox::BridgeEvent;
use ash_wire::Command;
use async_trait::async_trait;
use futures_util::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

const SSE_CHANNEL_CAPACITY: usize = 64;

pub struct RemoteRunnerBackend {
    client: reqwest::Client,
    base_url: String,
    internal_secret: Option<String>,
    cache: Mutex<HashMap<SandboxId, SandboxHandle>>,
}

impl RemoteRunnerBackend {
    pub fn new(base_url: impl Into<String>, internal_secret: Option<String>) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client, base_url: base_url.into(), internal_secret, cache: Mutex::new(HashMap::new()) })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.internal_secret {
            Some(secret) => builder.bearer_auth(secret),
            None => builder,
        }
    }

    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Err(BackendError::RunnerStatus { status, body })
    }
}

#[async_trait]
impl RunnerBackend for RemoteRunnerBackend {
    async fn create_sandbox(&self, req: CreateSandboxRequest) -> Result<SandboxHandle, BackendError> {
        let dto: CreateSandboxRequestDto = req.into();
        let resp = self.request(reqwest::Method::POST, "/runner/sandboxes").json(&dto).send().await?;
        let resp = Self::check_status(resp).await?;
        let handle_dto: SandboxHandleDto = resp.json().await?;
        let handle: SandboxHandle = handle_dto.into();
        self.cache.lock().insert(handle.sandbox_id, handle.clone());
        Ok(handle)
    }

    async fn destroy_sandbox(&self, id: SandboxId) -> Result<(), BackendError> {
        let path = format!("/runner/sandboxes/{id}");
        let resp = self.request(reqwest::Method::DELETE, &path).send().await?;
        self.cache.lock().remove(&id);
        // Destroy is idempotent (§4.6): a 404 from an already-gone sandbox
        // is not an error from the caller's point of view.
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check_status(resp).await?;
        Ok(())
    }

    async fn send_command(
        &self,
        id: SandboxId,
        command: &Command,
    ) -> Result<mpsc::Receiver<BridgeEvent>, BackendError> {
        let path = format!("/runner/sandboxes/{id}/cmd");
        let resp = self.request(reqwest::Method::POST, &path).json(command).send().await?;
        let resp = Self::check_status(resp).await?;

        let (tx, rx) = mpsc::channel(SSE_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let mut byte_stream = resp.bytes_stream();
            let mut buf = String::new();
            while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(err) => {
                        let _ = tx.send(BridgeEvent::DecodeError(format!("sse stream error: {err}"))).await;
                        break;
                    }
                };
                buf.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(idx) = buf.find("\n\n") {
                    let record = buf[..idx].to_string();
                    buf.drain(..idx + 2);
                    if let Some(event) = parse_sse_record(&record) {
                        if tx.send(event).await.is_err() {
                            return;
                        }
                    }
                }
            }
        });
        Ok(rx)
    }

    async fn interrupt(&self, id: SandboxId, session_id: SessionId) -> Result<(), BackendError> {
        let path = format!("/runner/sandboxes/{id}/interrupt");
        let resp = self.request(reqwest::Method::POST, &path).json(&InterruptRequest { session_id }).send().await?;
        Self::check_status(resp).await?;
        Ok(())
    }

    async fn get_sandbox(&self, id: SandboxId) -> Result<Option<SandboxHandle>, BackendError> {
        Ok(self.cache.lock().get(&id).cloned())
    }

    async fn is_sandbox_alive(&self, id: SandboxId) -> bool {
        self.cache.lock().contains_key(&id)
    }

    async fn mark_running(&self, id: SandboxId) -> Result<(), BackendError> {
        self.mark(id, MarkState::Running).await
    }

    async fn mark_waiting(&self, id: SandboxId) -> Result<(), BackendError> {
        self.mark(id, MarkState::Waiting).await
    }

    async fn persist_state(&self, id: SandboxId, session_id: SessionId, agent_name: &str) -> bool {
        let path = format!("/runner/sandboxes/{id}/persist");
        let body = PersistRequest { session_id, agent_name: agent_name.to_string() };
        let result = self.request(reqwest::Method::POST, &path).json(&body).send().await;
        match result {
            Ok(resp) => match Self::check_status(resp).await {
                Ok(resp) => resp.json::<PersistResponse>().await.map(|r| r.persisted).unwrap_or(false),
                Err(err) => {
                    warn!(sandbox_id = %id, error = %err, "remote persist_state failed");
                    false
                }
            },
            Err(err) => {
                warn!(sandbox_id = %id, error = %err, "remote persist_state request failed");
                false
            }
        }
    }

    fn record_cold_local_hit(&self) {}
    fn record_cold_cloud_hit(&self) {}
    fn record_cold_fresh_hit(&self) {}
    fn record_warm_hit(&self) {}

    async fn get_stats(&self) -> Result<PoolStats, BackendError> {
        let resp = self.request(reqwest::Method::GET, "/runner/health").send().await?;
        let resp = Self::check_status(resp).await?;
        Ok(resp.json().await?)
    }
}

impl RemoteRunnerBackend {
    async fn mark(&self, id: SandboxId, state: MarkState) -> Result<(), BackendError> {
        let path = format!("/runner/sandboxes/{id}/mark");
        let resp = self.request(reqwest::Method::POST, &path).json(&MarkRequest { state }).send().await?;
        Self::check_status(resp).await?;
        Ok(())
    }
}

fn parse_sse_record(record: &str) -> Option<BridgeEvent> {
    let data = record
        .lines()
        .find_map(|line| line.strip_prefix("data:"))
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))?;
    match serde_json::from_str::<SseFrame>(data) {
        Ok(frame) => Some(frame.into()),
        Err(err) => Some(BridgeEvent::DecodeError(format!("malformed sse frame: {err}"))),
    }
}
