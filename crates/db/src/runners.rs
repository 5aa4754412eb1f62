// SPDX-License-Identifier: MIT

//! Runner repository (§3, §4.7): discovery is purely DB-driven. Every write
//! here is an upsert or conditional delete so any number of coordinators
//! can race safely (§5, §8).

use crate::{format_ts, get_i64, get_str, parse_ts, Db, DbError};
use ash_core::ids::RunnerId;
use ash_core::runner::RunnerRecord;
use chrono::Utc;

impl Db {
    /// Upsert `(id, host, port, max_sandboxes)` and refresh the heartbeat
    /// (§4.7 `POST /api/internal/runners/register`).
    pub async fn register_runner(
        &self,
        id: RunnerId,
        host: &str,
        port: u16,
        max_sandboxes: u32,
    ) -> Result<(), DbError> {
        let now = format_ts(Utc::now());
        let existing = self.get_runner(id).await?;
        if existing.is_some() {
            sqlx::query(
                "UPDATE runners SET host = ?, port = ?, max_sandboxes = ?, last_heartbeat_at = ?
                 WHERE id = ?",
            )
            .bind(host)
            .bind(port as i64)
            .bind(max_sandboxes as i64)
            .bind(&now)
            .bind(id.as_str())
            .execute(self.pool())
            .await?;
        } else {
            sqlx::query(
                "INSERT INTO runners
                    (id, host, port, max_sandboxes, active_count, warming_count, last_heartbeat_at)
                 VALUES (?, ?, ?, ?, 0, 0, ?)",
            )
            .bind(id.as_str())
            .bind(host)
            .bind(port as i64)
            .bind(max_sandboxes as i64)
            .bind(&now)
            .execute(self.pool())
            .await?;
        }
        Ok(())
    }

    /// Update stats + heartbeat timestamp (§4.7 `POST .../heartbeat`).
    pub async fn heartbeat_runner(
        &self,
        id: RunnerId,
        active_count: u32,
        warming_count: u32,
    ) -> Result<(), DbError> {
        sqlx::query(
            "UPDATE runners SET active_count = ?, warming_count = ?, last_heartbeat_at = ? WHERE id = ?",
        )
        .bind(active_count as i64)
        .bind(warming_count as i64)
        .bind(format_ts(Utc::now()))
        .bind(id.as_str())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn get_runner(&self, id: RunnerId) -> Result<Option<RunnerRecord>, DbError> {
        let row = sqlx::query("SELECT * FROM runners WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(self.pool())
            .await?;
        row.map(|r| row_to_runner(&r)).transpose()
    }

    pub async fn list_runners(&self) -> Result<Vec<RunnerRecord>, DbError> {
        let rows = sqlx::query("SELECT * FROM runners ORDER BY id").fetch_all(self.pool()).await?;
        rows.iter().map(row_to_runner).collect()
    }

    /// Runners whose heartbeat is within `liveness_window` of `now` (§4.7
    /// selection / §3 "alive").
    pub async fn list_alive_runners(
        &self,
        now: chrono::DateTime<Utc>,
        liveness_window: chrono::Duration,
    ) -> Result<Vec<RunnerRecord>, DbError> {
        Ok(self
            .list_runners()
            .await?
            .into_iter()
            .filter(|runner| runner.is_alive(now, liveness_window))
            .collect())
    }

    /// Delete the runner row (§4.7 `handleDeadRunner` / graceful
    /// deregister). Idempotent: deleting an already-gone row is a no-op.
    pub async fn delete_runner(&self, id: RunnerId) -> Result<(), DbError> {
        sqlx::query("DELETE FROM runners WHERE id = ?").bind(id.as_str()).execute(self.pool()).await?;
        Ok(())
    }
}

fn row_to_runner(row: &sqlx::any::AnyRow) -> Result<RunnerRecord, DbError> {
    Ok(RunnerRecord {
        id: RunnerId::from_string(get_str(row, "id")?),
        host: get_str(row, "host")?,
        port: get_i64(row, "port")? as u16,
        max_sandboxes: get_i64(row, "max_sandboxes")? as u32,
        active_count: get_i64(row, "active_count")? as u32,
        warming_count: get_i64(row, "warming_count")? as u32,
        last_heartbeat_at: parse_ts(&get_str(row, "last_heartbeat_at")?)?,
    })
}
