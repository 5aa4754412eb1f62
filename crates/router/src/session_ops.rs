// SPDX-License-Identifier: MIT

//! Session lifecycle (§4.8): create, pause, resume, end, fork. Message
//! sending lives in [`crate::message`] since it owns the SSE stream.

use crate::error::RouterError;
use crate::SessionRouter;
use ash_backend::RunnerBackend;
use ash_core::clock::Clock;
use ash_core::ids::{SandboxId, SessionId, TenantId};
use ash_core::sandbox::CreateSandboxRequest;
use ash_core::session::{Session, SessionStatus};
use chrono::Utc;
use tracing::warn;

impl<C: Clock> SessionRouter<C> {
    /// §4.8 "Create": validate the agent, pick a backend, create the
    /// sandbox, then persist the session as `active`.
    pub async fn create_session(&self, tenant_id: TenantId, agent_name: &str) -> Result<Session, RouterError> {
        let agent = self.db.get_agent(tenant_id, agent_name).await?.ok_or(RouterError::AgentNotFound)?;
        let selected = self.coordinator.select_backend().await?;

        let mut session = Session::new_starting(agent_name, tenant_id, Utc::now());
        let req = CreateSandboxRequest {
            id: SandboxId::new(),
            tenant_id,
            agent_id: agent.id,
            agent_name: agent_name.to_string(),
            agent_dir: agent.path.clone(),
            session_id: Some(session.id),
            skip_agent_copy: false,
            limits: self.config.default_limits,
            extra_env: Vec::new(),
        };
        let handle = selected.backend.create_sandbox(req).await?;

        session.sandbox_id = Some(handle.sandbox_id);
        session.runner_id = selected.runner_id;
        self.db.insert_session(&session).await?;

        self.transition(&mut session, SessionStatus::Active).await?;
        Ok(session)
    }

    /// §4.8 "Pause": only from `active`.
    pub async fn pause(&self, tenant_id: TenantId, session_id: SessionId) -> Result<(), RouterError> {
        let mut session = self.load_scoped(tenant_id, session_id).await?;
        if session.status != SessionStatus::Active {
            return Err(RouterError::InvalidState);
        }

        if let Some(sandbox_id) = session.sandbox_id {
            if let Ok(backend) = self.coordinator.get_backend_for_runner_async(session.runner_id).await {
                if !backend.persist_state(sandbox_id, session.id, &session.agent_name).await {
                    warn!(session_id = %session.id, "best-effort persist failed on pause");
                }
            }
        }

        self.transition(&mut session, SessionStatus::Paused).await?;
        Ok(())
    }

    /// §4.8 "Resume": `410`-equivalent (`RouterError::Ended`) for `ended`,
    /// pass-through for `active`, otherwise a warm path (bound sandbox
    /// still alive) or a cold path (restore from local snapshot, cloud, or
    /// start fresh).
    pub async fn resume(&self, tenant_id: TenantId, session_id: SessionId) -> Result<Session, RouterError> {
        let mut session = self.load_scoped(tenant_id, session_id).await?;

        if session.status == SessionStatus::Ended {
            return Err(RouterError::Ended);
        }
        if session.status == SessionStatus::Active {
            return Ok(session);
        }

        if let Some(sandbox_id) = session.sandbox_id {
            if let Ok(backend) = self.coordinator.get_backend_for_runner_async(session.runner_id).await {
                if backend.is_sandbox_alive(sandbox_id).await {
                    backend.record_warm_hit();
                    self.transition(&mut session, SessionStatus::Active).await?;
                    return Ok(session);
                }
            }
        }

        self.resume_cold(tenant_id, &mut session).await?;
        Ok(session)
    }

    async fn resume_cold(&self, tenant_id: TenantId, session: &mut Session) -> Result<(), RouterError> {
        let agent = self.db.get_agent(tenant_id, &session.agent_name).await?.ok_or(RouterError::AgentNotFound)?;

        let local_snapshot_dir = self.config.data_dir.join("sessions").join(session.id.as_str()).join("workspace");
        let has_local_snapshot = tokio::fs::try_exists(&local_snapshot_dir).await.unwrap_or(false);

        let cloud_bytes = if has_local_snapshot {
            None
        } else {
            match &self.cloud {
                Some(cloud) => cloud.download(session.id.as_str()).await?,
                None => None,
            }
        };

        let selected = self.coordinator.select_backend().await?;
        let sandbox_id = SandboxId::new();
        let req = CreateSandboxRequest {
            id: sandbox_id,
            tenant_id,
            agent_id: agent.id,
            agent_name: session.agent_name.clone(),
            agent_dir: agent.path.clone(),
            session_id: Some(session.id),
            skip_agent_copy: has_local_snapshot || cloud_bytes.is_some(),
            limits: self.config.default_limits,
            extra_env: Vec::new(),
        };
        let handle = selected.backend.create_sandbox(req).await?;

        if has_local_snapshot {
            ash_storage::restore_session_state(&self.config.data_dir, session.id.as_str(), &handle.workspace_dir)
                .await?;
            selected.backend.record_cold_local_hit();
        } else if let Some(bytes) = cloud_bytes {
            let workspace_dir = handle.workspace_dir.clone();
            tokio::task::spawn_blocking(move || ash_storage::extract_bundle(&bytes, &workspace_dir))
                .await
                .map_err(|err| RouterError::Internal(format!("extract_bundle task panicked: {err}")))??;
            selected.backend.record_cold_cloud_hit();
        } else {
            selected.backend.record_cold_fresh_hit();
        }

        self.db.update_session_binding(session.id, Some(sandbox_id), selected.runner_id).await?;
        session.sandbox_id = Some(sandbox_id);
        session.runner_id = selected.runner_id;

        self.transition(session, SessionStatus::Active).await
    }

    /// §4.8 "End": best-effort persist, best-effort destroy (a runner
    /// already gone is not an error here), then `ended`.
    pub async fn end(&self, tenant_id: TenantId, session_id: SessionId) -> Result<(), RouterError> {
        let mut session = self.load_scoped(tenant_id, session_id).await?;
        if session.status.is_terminal() {
            return Ok(());
        }

        if let Some(sandbox_id) = session.sandbox_id {
            if let Ok(backend) = self.coordinator.get_backend_for_runner_async(session.runner_id).await {
                if !backend.persist_state(sandbox_id, session.id, &session.agent_name).await {
                    warn!(session_id = %session.id, "best-effort persist failed on end");
                }
                if let Err(err) = backend.destroy_sandbox(sandbox_id).await {
                    warn!(session_id = %session.id, %err, "destroy_sandbox failed on end (runner may already be gone)");
                }
            }
        }

        self.transition(&mut session, SessionStatus::Ended).await
    }

    /// §4.8 "Forks": inherits the parent's agent/config; gets its own id and
    /// no sandbox until first activation.
    pub async fn fork(&self, tenant_id: TenantId, session_id: SessionId) -> Result<Session, RouterError> {
        let parent = self.load_scoped(tenant_id, session_id).await?;
        let child = Session::fork_from(&parent, Utc::now());
        self.db.insert_session(&child).await?;
        Ok(child)
    }

    pub(crate) async fn load_scoped(&self, tenant_id: TenantId, session_id: SessionId) -> Result<Session, RouterError> {
        self.db.get_session_scoped(tenant_id, session_id).await?.ok_or(RouterError::NotFound)
    }

    async fn transition(&self, session: &mut Session, next: SessionStatus) -> Result<(), RouterError> {
        session.try_set_status(next).map_err(|_| RouterError::InvalidState)?;
        self.db.update_session_status(session.id, next).await?;
        Ok(())
    }
}
