// SPDX-License-Identifier: MIT

//! Canonical DB-backed state (§3, §6.4): agents, sessions, sandboxes,
//! runners, and append-only session events. SQLite backs a standalone
//! deployment; Postgres backs a multi-host fleet sharing one DB; both are
//! driven through `sqlx`'s `Any` backend so the repository modules hold a
//! single set of portable queries instead of two parallel implementations.
//!
//! Multi-coordinator safety (§4.7, §5, §8) rests entirely on this crate:
//! every write here is either an idempotent upsert or a conditional
//! `UPDATE ... WHERE` whose affected-row count the caller can inspect, so
//! concurrent coordinators never need a distributed lock.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod agents;
mod error;
pub mod runners;
pub mod sandboxes;
mod schema;
pub mod sessions;

pub use error::DbError;

use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::AnyPool;
use std::sync::Once;
use tracing::info;

static INSTALL_DRIVERS: Once = Once::new();

/// A handle to the canonical database, shared by every repository module in
/// this crate and cloned freely (the pool inside is itself an `Arc`).
#[derive(Clone)]
pub struct Db {
    pool: AnyPool,
}

impl Db {
    /// Connect to `database_url` (`sqlite://...`, `sqlite::memory:`, or
    /// `postgres://...`) and ensure the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        INSTALL_DRIVERS.call_once(|| {
            sqlx::any::install_default_drivers();
        });
        let pool = AnyPoolOptions::new().max_connections(10).connect(database_url).await?;
        let db = Self { pool };
        db.migrate().await?;
        info!("database connected and schema ensured");
        Ok(db)
    }

    /// Wrap an already-connected pool (used by tests that want to share one
    /// in-memory SQLite connection across repository calls).
    pub fn from_pool(pool: AnyPool) -> Self {
        Self { pool }
    }

    /// Create every table/index if it does not already exist (§6.4). Plain
    /// `CREATE TABLE IF NOT EXISTS` rather than `sqlx::migrate!`, since the
    /// schema is small, append-only in practice, and must run identically
    /// against both backends through the `Any` driver.
    async fn migrate(&self) -> Result<(), DbError> {
        for statement in schema::ALL {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// RFC3339 timestamp formatting shared by every repository module: columns
/// are `TEXT`, so we own both directions of the conversion rather than
/// relying on backend-specific timestamp decoding through `Any`.
pub(crate) fn format_ts(ts: chrono::DateTime<chrono::Utc>) -> String {
    ts.to_rfc3339()
}

pub(crate) fn parse_ts(raw: &str) -> Result<chrono::DateTime<chrono::Utc>, DbError> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|err| DbError::Decode(format!("bad timestamp {raw:?}: {err}")))
}

pub(crate) fn get_str(row: &AnyRow, idx: &str) -> Result<String, DbError> {
    use sqlx::Row;
    row.try_get::<String, _>(idx).map_err(DbError::from)
}

pub(crate) fn get_opt_str(row: &AnyRow, idx: &str) -> Result<Option<String>, DbError> {
    use sqlx::Row;
    row.try_get::<Option<String>, _>(idx).map_err(DbError::from)
}

pub(crate) fn get_i64(row: &AnyRow, idx: &str) -> Result<i64, DbError> {
    use sqlx::Row;
    row.try_get::<i64, _>(idx).map_err(DbError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_creates_schema_idempotently() {
        let db = Db::connect("sqlite::memory:").await.unwrap();
        // Running migrate twice must not error (IF NOT EXISTS).
        db.migrate().await.unwrap();
    }
}
