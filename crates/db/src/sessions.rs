// SPDX-License-Identifier: MIT

//! Session repository (§3, §4.8): lifecycle status, sandbox/runner binding,
//! and the conditional bulk-pause used by `handleDeadRunner` (§4.7).

use crate::{format_ts, get_str, parse_ts, Db, DbError};
use ash_core::ids::{RunnerId, SandboxId, SessionId, TenantId};
use ash_core::session::{Session, SessionConfig, SessionStatus};
use chrono::Utc;
use sqlx::any::AnyRow;
use sqlx::Row;

impl Db {
    pub async fn insert_session(&self, session: &Session) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO sessions
                (id, tenant_id, agent_name, sandbox_id, status, runner_id,
                 created_at, last_active_at, parent_session_id, config)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(session.id.as_str())
        .bind(session.tenant_id.as_str())
        .bind(&session.agent_name)
        .bind(session.sandbox_id.as_ref().map(|id| id.as_str().to_string()))
        .bind(session.status.to_string())
        .bind(session.runner_id.as_ref().map(|id| id.as_str().to_string()))
        .bind(format_ts(session.created_at))
        .bind(format_ts(session.last_active_at))
        .bind(session.parent_session_id.as_ref().map(|id| id.as_str().to_string()))
        .bind(session.config.as_ref().map(|c| serde_json::to_string(c).unwrap_or_default()))
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn get_session(&self, id: SessionId) -> Result<Option<Session>, DbError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(self.pool())
            .await?;
        row.map(|r| row_to_session(&r)).transpose()
    }

    /// Load a session scoped to `tenant_id`: absent if it belongs to a
    /// different tenant (§6.1 tenant scoping).
    pub async fn get_session_scoped(&self, tenant_id: TenantId, id: SessionId) -> Result<Option<Session>, DbError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = ? AND tenant_id = ?")
            .bind(id.as_str())
            .bind(tenant_id.as_str())
            .fetch_optional(self.pool())
            .await?;
        row.map(|r| row_to_session(&r)).transpose()
    }

    pub async fn list_sessions(
        &self,
        tenant_id: TenantId,
        agent_name: Option<&str>,
    ) -> Result<Vec<Session>, DbError> {
        let rows = match agent_name {
            Some(agent_name) => {
                sqlx::query("SELECT * FROM sessions WHERE tenant_id = ? AND agent_name = ? ORDER BY created_at")
                    .bind(tenant_id.as_str())
                    .bind(agent_name)
                    .fetch_all(self.pool())
                    .await?
            }
            None => {
                sqlx::query("SELECT * FROM sessions WHERE tenant_id = ? ORDER BY created_at")
                    .bind(tenant_id.as_str())
                    .fetch_all(self.pool())
                    .await?
            }
        };
        rows.iter().map(row_to_session).collect()
    }

    pub async fn update_session_status(&self, id: SessionId, status: SessionStatus) -> Result<(), DbError> {
        sqlx::query("UPDATE sessions SET status = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(id.as_str())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Update the session's sandbox/runner binding, used on create and on
    /// cold resume when a fresh sandbox is created on a (possibly
    /// different) runner (§4.8).
    pub async fn update_session_binding(
        &self,
        id: SessionId,
        sandbox_id: Option<SandboxId>,
        runner_id: Option<RunnerId>,
    ) -> Result<(), DbError> {
        sqlx::query("UPDATE sessions SET sandbox_id = ?, runner_id = ? WHERE id = ?")
            .bind(sandbox_id.as_ref().map(|id| id.as_str().to_string()))
            .bind(runner_id.as_ref().map(|id| id.as_str().to_string()))
            .bind(id.as_str())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn touch_session_last_active(&self, id: SessionId) -> Result<(), DbError> {
        sqlx::query("UPDATE sessions SET last_active_at = ? WHERE id = ?")
            .bind(format_ts(Utc::now()))
            .bind(id.as_str())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Pause every `starting`/`active` session bound to `runner_id`
    /// (§4.7 `handleDeadRunner`). A single conditional `UPDATE ... WHERE`
    /// so it is idempotent across any number of concurrent coordinators
    /// racing to handle the same dead runner.
    pub async fn pause_sessions_for_runner(&self, runner_id: RunnerId) -> Result<u64, DbError> {
        let result = sqlx::query(
            "UPDATE sessions SET status = 'paused'
             WHERE runner_id = ? AND status IN ('starting', 'active')",
        )
        .bind(runner_id.as_str())
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }
}

fn row_to_session(row: &AnyRow) -> Result<Session, DbError> {
    let status_raw = get_str(row, "status")?;
    let status = parse_status(&status_raw)?;
    let config_raw: Option<String> = row.try_get("config").map_err(DbError::from)?;
    let config: Option<SessionConfig> = config_raw
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(|err| DbError::Decode(format!("bad session config json: {err}")))?;
    let sandbox_id: Option<String> = row.try_get("sandbox_id").map_err(DbError::from)?;
    let runner_id: Option<String> = row.try_get("runner_id").map_err(DbError::from)?;
    let parent_session_id: Option<String> = row.try_get("parent_session_id").map_err(DbError::from)?;

    Ok(Session {
        id: SessionId::from_string(get_str(row, "id")?),
        tenant_id: TenantId::from_string(get_str(row, "tenant_id")?),
        agent_name: get_str(row, "agent_name")?,
        sandbox_id: sandbox_id.map(SandboxId::from_string),
        status,
        runner_id: runner_id.map(RunnerId::from_string),
        created_at: parse_ts(&get_str(row, "created_at")?)?,
        last_active_at: parse_ts(&get_str(row, "last_active_at")?)?,
        parent_session_id: parent_session_id.map(SessionId::from_string),
        config,
    })
}

fn parse_status(raw: &str) -> Result<SessionStatus, DbError> {
    match raw {
        "starting" => Ok(SessionStatus::Starting),
        "active" => Ok(SessionStatus::Active),
        "paused" => Ok(SessionStatus::Paused),
        "ended" => Ok(SessionStatus::Ended),
        "error" => Ok(SessionStatus::Error),
        "stopped" => Ok(SessionStatus::Stopped),
        other => Err(DbError::Decode(format!("unknown session status {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash_core::ids::TenantId;

    async fn test_db() -> Db {
        Db::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn insert_and_get_round_trips() {
        let db = test_db().await;
        let tenant = TenantId::new();
        let session = Session::new_starting("agent-a", tenant, Utc::now());
        db.insert_session(&session).await.unwrap();

        let fetched = db.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, session.id);
        assert_eq!(fetched.status, SessionStatus::Starting);
    }

    #[tokio::test]
    async fn scoped_get_returns_none_for_wrong_tenant() {
        let db = test_db().await;
        let session = Session::new_starting("agent-a", TenantId::new(), Utc::now());
        db.insert_session(&session).await.unwrap();

        assert!(db.get_session_scoped(TenantId::new(), session.id).await.unwrap().is_none());
        assert!(db.get_session_scoped(session.tenant_id, session.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn pause_sessions_for_runner_only_touches_starting_and_active() {
        let db = test_db().await;
        let runner = RunnerId::new();
        let tenant = TenantId::new();

        let mut starting = Session::new_starting("a", tenant, Utc::now());
        starting.runner_id = Some(runner);
        db.insert_session(&starting).await.unwrap();

        let mut ended = Session::new_starting("a", tenant, Utc::now());
        ended.runner_id = Some(runner);
        ended.status = SessionStatus::Ended;
        db.insert_session(&ended).await.unwrap();

        let affected = db.pause_sessions_for_runner(runner).await.unwrap();
        assert_eq!(affected, 1);

        assert_eq!(db.get_session(starting.id).await.unwrap().unwrap().status, SessionStatus::Paused);
        assert_eq!(db.get_session(ended.id).await.unwrap().unwrap().status, SessionStatus::Ended);
    }

    #[tokio::test]
    async fn update_binding_and_status_persist() {
        let db = test_db().await;
        let session = Session::new_starting("a", TenantId::new(), Utc::now());
        db.insert_session(&session).await.unwrap();

        let sandbox_id = SandboxId::new();
        db.update_session_binding(session.id, Some(sandbox_id), None).await.unwrap();
        db.update_session_status(session.id, SessionStatus::Active).await.unwrap();

        let fetched = db.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(fetched.sandbox_id, Some(sandbox_id));
        assert_eq!(fetched.status, SessionStatus::Active);
    }
}
