// SPDX-License-Identifier: MIT

//! The deployable unit: an agent directory tied to a `(tenantId, name)` slot.

use crate::ids::{AgentId, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The descriptor file every agent directory must contain.
pub const AGENT_DESCRIPTOR_FILE: &str = "CLAUDE.md";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Agent {
    pub id: AgentId,
    pub tenant_id: TenantId,
    pub name: String,
    /// Monotonically increasing; bumped on every re-deploy.
    pub version: u64,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    pub fn descriptor_path(&self) -> PathBuf {
        self.path.join(AGENT_DESCRIPTOR_FILE)
    }
}

/// Request to deploy or re-deploy an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployAgentRequest {
    pub tenant_id: TenantId,
    pub name: String,
    pub path: PathBuf,
}
