// SPDX-License-Identifier: MIT

//! DDL for the canonical tables (§3, §6.4). Kept deliberately portable
//! across the two backends this crate targets (SQLite for standalone,
//! Postgres for multi-host, per `ash-db`'s module doc): no `AUTOINCREMENT`
//! (ids are app-generated nanoids), no native JSON/boolean/timestamp column
//! types, everything that isn't an integer count is `TEXT`.

pub const CREATE_AGENTS: &str = "
CREATE TABLE IF NOT EXISTS agents (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    name TEXT NOT NULL,
    version INTEGER NOT NULL,
    path TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (tenant_id, name)
)";

pub const CREATE_SESSIONS: &str = "
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    agent_name TEXT NOT NULL,
    sandbox_id TEXT,
    status TEXT NOT NULL,
    runner_id TEXT,
    created_at TEXT NOT NULL,
    last_active_at TEXT NOT NULL,
    parent_session_id TEXT,
    config TEXT
)";

pub const CREATE_SESSIONS_RUNNER_IDX: &str = "
CREATE INDEX IF NOT EXISTS sessions_runner_id_idx ON sessions (runner_id)";

pub const CREATE_SESSIONS_TENANT_IDX: &str = "
CREATE INDEX IF NOT EXISTS sessions_tenant_id_idx ON sessions (tenant_id)";

pub const CREATE_SANDBOXES: &str = "
CREATE TABLE IF NOT EXISTS sandboxes (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    session_id TEXT,
    agent_name TEXT NOT NULL,
    state TEXT NOT NULL,
    workspace_dir TEXT NOT NULL,
    owner_host TEXT NOT NULL,
    created_at TEXT NOT NULL,
    last_used_at TEXT NOT NULL
)";

pub const CREATE_SANDBOXES_HOST_IDX: &str = "
CREATE INDEX IF NOT EXISTS sandboxes_owner_host_idx ON sandboxes (owner_host)";

pub const CREATE_RUNNERS: &str = "
CREATE TABLE IF NOT EXISTS runners (
    id TEXT PRIMARY KEY,
    host TEXT NOT NULL,
    port INTEGER NOT NULL,
    max_sandboxes INTEGER NOT NULL,
    active_count INTEGER NOT NULL,
    warming_count INTEGER NOT NULL,
    last_heartbeat_at TEXT NOT NULL
)";

/// Append-only session events (§3 "out of scope beyond shape: they exist so
/// resume can replay"). Nothing in the core engine reads this table back
/// yet; it exists so `ash-router` has somewhere durable to append to.
pub const CREATE_SESSION_EVENTS: &str = "
CREATE TABLE IF NOT EXISTS session_events (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    payload TEXT NOT NULL,
    created_at TEXT NOT NULL
)";

pub const CREATE_SESSION_EVENTS_SESSION_IDX: &str = "
CREATE INDEX IF NOT EXISTS session_events_session_id_idx ON session_events (session_id)";

/// All DDL statements in dependency order, executed one at a time since the
/// `Any` driver does not support multi-statement execution.
pub const ALL: &[&str] = &[
    CREATE_AGENTS,
    CREATE_SESSIONS,
    CREATE_SESSIONS_RUNNER_IDX,
    CREATE_SESSIONS_TENANT_IDX,
    CREATE_SANDBOXES,
    CREATE_SANDBOXES_HOST_IDX,
    CREATE_RUNNERS,
    CREATE_SESSION_EVENTS,
    CREATE_SESSION_EVENTS_SESSION_IDX,
];
