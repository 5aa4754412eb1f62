// SPDX-License-Identifier: MIT

//! Sandbox repository (§3, §4.4): the DB row is the canonical state for
//! every sandbox ever created on a host; the in-memory pool only tracks the
//! subset currently live. `owner_host` scopes capacity counting, startup
//! recovery, and cold cleanup to "sandboxes this process is responsible
//! for" (a column the in-process `ash_core::Sandbox` type has no need for).

use crate::{format_ts, get_str, parse_ts, Db, DbError};
use ash_core::ids::{SandboxId, SessionId, TenantId};
use ash_core::sandbox::{Sandbox, SandboxState};
use chrono::{DateTime, Utc};
use sqlx::any::AnyRow;
use sqlx::Row;
use std::path::PathBuf;

impl Db {
    pub async fn insert_sandbox(&self, sandbox: &Sandbox, owner_host: &str) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO sandboxes
                (id, tenant_id, session_id, agent_name, state, workspace_dir,
                 owner_host, created_at, last_used_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(sandbox.id.as_str())
        .bind(sandbox.tenant_id.as_str())
        .bind(sandbox.session_id.as_ref().map(|id| id.as_str().to_string()))
        .bind(&sandbox.agent_name)
        .bind(sandbox.state.to_string())
        .bind(sandbox.workspace_dir.to_string_lossy().into_owned())
        .bind(owner_host)
        .bind(format_ts(sandbox.created_at))
        .bind(format_ts(sandbox.last_used_at))
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn get_sandbox(&self, id: SandboxId) -> Result<Option<Sandbox>, DbError> {
        let row = sqlx::query("SELECT * FROM sandboxes WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(self.pool())
            .await?;
        row.map(|r| row_to_sandbox(&r)).transpose()
    }

    pub async fn update_sandbox_state(
        &self,
        id: SandboxId,
        state: SandboxState,
        last_used_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        sqlx::query("UPDATE sandboxes SET state = ?, last_used_at = ? WHERE id = ?")
            .bind(state.to_string())
            .bind(format_ts(last_used_at))
            .bind(id.as_str())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Bind a pre-warmed, unowned sandbox to a session (§4.4 pre-warm
    /// consumption): sets `session_id` without touching `state` (the caller
    /// still drives `warm -> running` itself).
    pub async fn bind_sandbox_session(&self, id: SandboxId, session_id: SessionId) -> Result<(), DbError> {
        sqlx::query("UPDATE sandboxes SET session_id = ? WHERE id = ?")
            .bind(session_id.as_str())
            .bind(id.as_str())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn delete_sandbox(&self, id: SandboxId) -> Result<(), DbError> {
        sqlx::query("DELETE FROM sandboxes WHERE id = ?").bind(id.as_str()).execute(self.pool()).await?;
        Ok(())
    }

    /// Startup recovery (§4.4): every row this host owns is reconciled to
    /// `cold` since no in-memory live entries exist yet after a restart.
    pub async fn mark_all_owned_cold(&self, owner_host: &str) -> Result<u64, DbError> {
        let result = sqlx::query("UPDATE sandboxes SET state = 'cold' WHERE owner_host = ? AND state != 'cold'")
            .bind(owner_host)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }

    /// Total rows (live + cold) owned by this host, for the admission
    /// capacity check (§4.4, §8: `activeCount + coldCount <= maxCapacity`).
    pub async fn count_owned(&self, owner_host: &str) -> Result<i64, DbError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM sandboxes WHERE owner_host = ?")
            .bind(owner_host)
            .fetch_one(self.pool())
            .await?;
        row.try_get::<i64, _>("n").map_err(DbError::from)
    }

    /// The single oldest `cold` row owned by this host, used as the
    /// capacity-eviction candidate's top tier (§4.4 "cold first"): a cold
    /// row has no live process, so "evicting" it just means freeing its
    /// bookkeeping slot.
    pub async fn oldest_cold(&self, owner_host: &str) -> Result<Option<Sandbox>, DbError> {
        let row = sqlx::query(
            "SELECT * FROM sandboxes WHERE owner_host = ? AND state = 'cold'
             ORDER BY last_used_at ASC LIMIT 1",
        )
        .bind(owner_host)
        .fetch_optional(self.pool())
        .await?;
        row.map(|r| row_to_sandbox(&r)).transpose()
    }

    /// Count of `cold` rows owned by this host, for `getStats()`'s
    /// `coldCount` (§4.4, §4.6) — distinct from [`Self::count_owned`], which
    /// counts live rows too.
    pub async fn count_cold(&self, owner_host: &str) -> Result<i64, DbError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM sandboxes WHERE owner_host = ? AND state = 'cold'")
            .bind(owner_host)
            .fetch_one(self.pool())
            .await?;
        row.try_get::<i64, _>("n").map_err(DbError::from)
    }

    /// Cold rows owned by this host whose `last_used_at` is older than
    /// `cutoff`, for the cold-cleanup sweep (§4.4).
    pub async fn list_cold_older_than(
        &self,
        owner_host: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Sandbox>, DbError> {
        let rows = sqlx::query(
            "SELECT * FROM sandboxes WHERE owner_host = ? AND state = 'cold' AND last_used_at < ?",
        )
        .bind(owner_host)
        .bind(format_ts(cutoff))
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(row_to_sandbox).collect()
    }
}

fn row_to_sandbox(row: &AnyRow) -> Result<Sandbox, DbError> {
    let state_raw = get_str(row, "state")?;
    let session_id: Option<String> = row.try_get("session_id").map_err(DbError::from)?;
    Ok(Sandbox {
        id: SandboxId::from_string(get_str(row, "id")?),
        tenant_id: TenantId::from_string(get_str(row, "tenant_id")?),
        session_id: session_id.map(SessionId::from_string),
        agent_name: get_str(row, "agent_name")?,
        state: parse_state(&state_raw)?,
        workspace_dir: PathBuf::from(get_str(row, "workspace_dir")?),
        created_at: parse_ts(&get_str(row, "created_at")?)?,
        last_used_at: parse_ts(&get_str(row, "last_used_at")?)?,
    })
}

fn parse_state(raw: &str) -> Result<SandboxState, DbError> {
    match raw {
        "cold" => Ok(SandboxState::Cold),
        "warming" => Ok(SandboxState::Warming),
        "warm" => Ok(SandboxState::Warm),
        "waiting" => Ok(SandboxState::Waiting),
        "running" => Ok(SandboxState::Running),
        other => Err(DbError::Decode(format!("unknown sandbox state {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash_core::ids::TenantId;
    use chrono::Duration;

    async fn test_db() -> Db {
        Db::connect("sqlite::memory:").await.unwrap()
    }

    fn sandbox(state: SandboxState) -> Sandbox {
        Sandbox {
            id: SandboxId::new(),
            tenant_id: TenantId::new(),
            session_id: None,
            agent_name: "a".into(),
            state,
            workspace_dir: PathBuf::from("/sandboxes/x/workspace"),
            created_at: Utc::now(),
            last_used_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_and_get_round_trips() {
        let db = test_db().await;
        let sbx = sandbox(SandboxState::Warming);
        db.insert_sandbox(&sbx, "host-1").await.unwrap();

        let fetched = db.get_sandbox(sbx.id).await.unwrap().unwrap();
        assert_eq!(fetched.state, SandboxState::Warming);
    }

    #[tokio::test]
    async fn startup_recovery_marks_only_this_hosts_rows_cold() {
        let db = test_db().await;
        let mine = sandbox(SandboxState::Warm);
        let theirs = sandbox(SandboxState::Warm);
        db.insert_sandbox(&mine, "host-1").await.unwrap();
        db.insert_sandbox(&theirs, "host-2").await.unwrap();

        let affected = db.mark_all_owned_cold("host-1").await.unwrap();
        assert_eq!(affected, 1);

        assert_eq!(db.get_sandbox(mine.id).await.unwrap().unwrap().state, SandboxState::Cold);
        assert_eq!(db.get_sandbox(theirs.id).await.unwrap().unwrap().state, SandboxState::Warm);
    }

    #[tokio::test]
    async fn count_owned_counts_live_and_cold_together() {
        let db = test_db().await;
        db.insert_sandbox(&sandbox(SandboxState::Warm), "host-1").await.unwrap();
        db.insert_sandbox(&sandbox(SandboxState::Cold), "host-1").await.unwrap();
        db.insert_sandbox(&sandbox(SandboxState::Warm), "host-2").await.unwrap();

        assert_eq!(db.count_owned("host-1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn list_cold_older_than_respects_cutoff() {
        let db = test_db().await;
        let now = Utc::now();
        let mut stale = sandbox(SandboxState::Cold);
        stale.last_used_at = now - Duration::hours(2);
        let mut fresh = sandbox(SandboxState::Cold);
        fresh.last_used_at = now;

        db.insert_sandbox(&stale, "host-1").await.unwrap();
        db.insert_sandbox(&fresh, "host-1").await.unwrap();

        let cutoff = now - Duration::hours(1);
        let rows = db.list_cold_older_than("host-1", cutoff).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, stale.id);
    }
}
