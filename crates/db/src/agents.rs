// SPDX-License-Identifier: MIT

//! Agent repository (§3): `(tenant_id, name)` is unique, `id` is stable
//! across re-deploys, `version` increments on each re-deploy.

use crate::{format_ts, get_i64, get_str, parse_ts, Db, DbError};
use ash_core::ids::{AgentId, TenantId};
use ash_core::agent::{Agent, DeployAgentRequest};
use chrono::Utc;
use std::path::PathBuf;

impl Db {
    /// Deploy or re-deploy an agent (§3 "created on deploy; updated on
    /// re-deploy"). Looks the row up by `(tenant_id, name)`; if present,
    /// bumps `version` and updates `path`/`updated_at` while keeping `id`
    /// stable; otherwise inserts a fresh row at `version` 1.
    pub async fn deploy_agent(&self, req: &DeployAgentRequest) -> Result<Agent, DbError> {
        let now = Utc::now();
        if let Some(existing) = self.get_agent(req.tenant_id, &req.name).await? {
            sqlx::query(
                "UPDATE agents SET version = ?, path = ?, updated_at = ? WHERE id = ?",
            )
            .bind(existing.version as i64 + 1)
            .bind(req.path.to_string_lossy().into_owned())
            .bind(format_ts(now))
            .bind(existing.id.as_str())
            .execute(self.pool())
            .await?;
            return self
                .get_agent(req.tenant_id, &req.name)
                .await?
                .ok_or(DbError::NotFound);
        }

        let agent = Agent {
            id: AgentId::new(),
            tenant_id: req.tenant_id,
            name: req.name.clone(),
            version: 1,
            path: req.path.clone(),
            created_at: now,
            updated_at: now,
        };
        sqlx::query(
            "INSERT INTO agents (id, tenant_id, name, version, path, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(agent.id.as_str())
        .bind(agent.tenant_id.as_str())
        .bind(&agent.name)
        .bind(agent.version as i64)
        .bind(agent.path.to_string_lossy().into_owned())
        .bind(format_ts(agent.created_at))
        .bind(format_ts(agent.updated_at))
        .execute(self.pool())
        .await?;
        Ok(agent)
    }

    pub async fn get_agent(&self, tenant_id: TenantId, name: &str) -> Result<Option<Agent>, DbError> {
        let row = sqlx::query("SELECT * FROM agents WHERE tenant_id = ? AND name = ?")
            .bind(tenant_id.as_str())
            .bind(name)
            .fetch_optional(self.pool())
            .await?;
        row.map(|r| row_to_agent(&r)).transpose()
    }

    pub async fn list_agents(&self, tenant_id: TenantId) -> Result<Vec<Agent>, DbError> {
        let rows = sqlx::query("SELECT * FROM agents WHERE tenant_id = ? ORDER BY name")
            .bind(tenant_id.as_str())
            .fetch_all(self.pool())
            .await?;
        rows.iter().map(row_to_agent).collect()
    }

    /// Returns whether a row was deleted. Does not cascade to sessions
    /// (§3 "deletion does not cascade to sessions").
    pub async fn delete_agent(&self, tenant_id: TenantId, name: &str) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM agents WHERE tenant_id = ? AND name = ?")
            .bind(tenant_id.as_str())
            .bind(name)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn row_to_agent(row: &sqlx::any::AnyRow) -> Result<Agent, DbError> {
    Ok(Agent {
        id: AgentId::from_string(get_str(row, "id")?),
        tenant_id: TenantId::from_string(get_str(row, "tenant_id")?),
        name: get_str(row, "name")?,
        version: get_i64(row, "version")? as u64,
        path: PathBuf::from(get_str(row, "path")?),
        created_at: parse_ts(&get_str(row, "created_at")?)?,
        updated_at: parse_ts(&get_str(row, "updated_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Db {
        Db::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn deploy_inserts_at_version_one() {
        let db = test_db().await;
        let tenant = TenantId::new();
        let req = DeployAgentRequest { tenant_id: tenant, name: "a".into(), path: "/agents/a".into() };
        let agent = db.deploy_agent(&req).await.unwrap();
        assert_eq!(agent.version, 1);
    }

    #[tokio::test]
    async fn redeploy_bumps_version_and_keeps_id() {
        let db = test_db().await;
        let tenant = TenantId::new();
        let req = DeployAgentRequest { tenant_id: tenant, name: "a".into(), path: "/agents/a".into() };
        let first = db.deploy_agent(&req).await.unwrap();

        let req2 = DeployAgentRequest { tenant_id: tenant, name: "a".into(), path: "/agents/a-v2".into() };
        let second = db.deploy_agent(&req2).await.unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.version, 2);
        assert_eq!(second.path, PathBuf::from("/agents/a-v2"));
    }

    #[tokio::test]
    async fn tenant_name_is_scoped_per_tenant() {
        let db = test_db().await;
        let tenant_a = TenantId::new();
        let tenant_b = TenantId::new();
        db.deploy_agent(&DeployAgentRequest { tenant_id: tenant_a, name: "a".into(), path: "/a".into() })
            .await
            .unwrap();
        db.deploy_agent(&DeployAgentRequest { tenant_id: tenant_b, name: "a".into(), path: "/b".into() })
            .await
            .unwrap();

        assert_eq!(db.list_agents(tenant_a).await.unwrap().len(), 1);
        assert_eq!(db.list_agents(tenant_b).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_row_and_reports_existence() {
        let db = test_db().await;
        let tenant = TenantId::new();
        db.deploy_agent(&DeployAgentRequest { tenant_id: tenant, name: "a".into(), path: "/a".into() })
            .await
            .unwrap();

        assert!(db.delete_agent(tenant, "a").await.unwrap());
        assert!(!db.delete_agent(tenant, "a").await.unwrap());
        assert!(db.get_agent(tenant, "a").await.unwrap().is_none());
    }
}
