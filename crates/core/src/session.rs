// SPDX-License-Identifier: MIT

//! Session: a logical conversation, independent of any one sandbox.

use crate::ids::{AgentId, RunnerId, SandboxId, SessionId, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session lifecycle status (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Starting,
    Active,
    Paused,
    Ended,
    Error,
    Stopped,
}

impl SessionStatus {
    /// `ended` is absorbing: no transition leaves it.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Ended)
    }

    /// Whether a message may be sent while the session is in this status.
    /// Per §4.8/§8: message send is rejected from any state but `active`.
    pub fn accepts_messages(self) -> bool {
        matches!(self, SessionStatus::Active)
    }

    /// Whether `can_transition_to` allows moving from `self` to `next`.
    ///
    /// Encodes the lifecycle graph of §3: `starting -> active`,
    /// `active <-> paused`, `paused -> ended`, `active -> ended`,
    /// any non-terminal -> `error`, `active -> stopped`. `ended` is absorbing.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (Starting, Active) | (Starting, Error) => true,
            (Active, Paused) | (Active, Ended) | (Active, Error) | (Active, Stopped) => true,
            (Paused, Active) | (Paused, Ended) | (Paused, Error) => true,
            (Error, Ended) => true,
            (Stopped, Ended) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Starting => "starting",
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::Ended => "ended",
            SessionStatus::Error => "error",
            SessionStatus::Stopped => "stopped",
        };
        write!(f, "{s}")
    }
}

/// Optional per-session configuration blob (model, tools, subagents).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub subagents: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub tenant_id: TenantId,
    pub agent_name: String,
    /// Hint, not a capability: may point to a dead sandbox.
    pub sandbox_id: Option<SandboxId>,
    pub status: SessionStatus,
    /// `None` means "local backend".
    pub runner_id: Option<RunnerId>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub parent_session_id: Option<SessionId>,
    pub config: Option<SessionConfig>,
}

impl Session {
    pub fn new_starting(agent_name: impl Into<String>, tenant_id: TenantId, now: DateTime<Utc>) -> Self {
        Self {
            id: SessionId::new(),
            tenant_id,
            agent_name: agent_name.into(),
            sandbox_id: None,
            status: SessionStatus::Starting,
            runner_id: None,
            created_at: now,
            last_active_at: now,
            parent_session_id: None,
            config: None,
        }
    }

    /// Build a forked session inheriting the parent's agent and config but
    /// with its own identity and no sandbox binding yet (§4.8 "Forks").
    pub fn fork_from(parent: &Session, now: DateTime<Utc>) -> Self {
        Self {
            id: SessionId::new(),
            tenant_id: parent.tenant_id,
            agent_name: parent.agent_name.clone(),
            sandbox_id: None,
            status: SessionStatus::Starting,
            runner_id: None,
            created_at: now,
            last_active_at: now,
            parent_session_id: Some(parent.id),
            config: parent.config.clone(),
        }
    }

    /// Apply a status transition if legal; returns `Err(())` (caller
    /// supplies context) if the transition violates the lifecycle graph.
    pub fn try_set_status(&mut self, next: SessionStatus) -> Result<(), SessionStatus> {
        if !self.status.can_transition_to(next) {
            return Err(self.status);
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
