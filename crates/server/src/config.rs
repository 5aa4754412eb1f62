// SPDX-License-Identifier: MIT

//! Centralized environment variable access (§6.5), in the style of the
//! daemon's own `env.rs`: free functions/a plain struct, no config crate.

use ash_core::ids::{RunnerId, TenantId};
use std::path::PathBuf;
use std::time::Duration;

/// What mode this process runs in: a one-box control plane plus local
/// sandboxes, or a pure coordinator fronting a fleet of remote runners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Standalone,
    Coordinator,
}

impl Mode {
    fn from_env() -> Self {
        match std::env::var("ASH_MODE").as_deref() {
            Ok("coordinator") => Mode::Coordinator,
            _ => Mode::Standalone,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub database_url: String,
    pub mode: Mode,
    pub bridge_entry: PathBuf,
    pub max_sandboxes: u32,
    pub idle_timeout_ms: u64,
    pub api_key: Option<String>,
    pub internal_secret: Option<String>,
    pub runner_id: RunnerId,
    pub runner_port: u16,
    pub runner_advertise_host: String,
    pub snapshot_url: Option<String>,
    pub debug_timing: bool,
    /// Not an `ASH_*` var of its own; derived once per process so the
    /// single-tenant auth model (DESIGN.md) has a stable `tenantId` to
    /// scope every row under.
    pub default_tenant_id: TenantId,
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str) -> bool {
    matches!(std::env::var(key).as_deref(), Ok("1") | Ok("true") | Ok("yes"))
}

fn default_data_dir() -> PathBuf {
    if let Some(dir) = env_string("ASH_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")).join("ash")
}

impl Config {
    /// Read every recognized `ASH_*` variable (§6.5), applying the same
    /// defaults documented there.
    pub fn from_env() -> Self {
        let data_dir = default_data_dir();
        let database_url = env_string("ASH_DATABASE_URL")
            .unwrap_or_else(|| format!("sqlite://{}", data_dir.join("ash.db").display()));

        Self {
            host: env_string("ASH_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: env_u16("ASH_PORT", 8080),
            data_dir,
            database_url,
            mode: Mode::from_env(),
            bridge_entry: env_string("ASH_BRIDGE_ENTRY")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("ash-bridge")),
            max_sandboxes: env_u32("ASH_MAX_SANDBOXES", 64),
            idle_timeout_ms: env_u64("ASH_IDLE_TIMEOUT_MS", 5 * 60 * 1000),
            api_key: env_string("ASH_API_KEY"),
            internal_secret: env_string("ASH_INTERNAL_SECRET"),
            runner_id: env_string("ASH_RUNNER_ID").map(RunnerId::from_string).unwrap_or_else(RunnerId::new),
            runner_port: env_u16("ASH_RUNNER_PORT", 8081),
            runner_advertise_host: env_string("ASH_RUNNER_ADVERTISE_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            snapshot_url: env_string("ASH_SNAPSHOT_URL"),
            debug_timing: env_bool("ASH_DEBUG_TIMING"),
            default_tenant_id: TenantId::new(),
        }
    }

    pub fn liveness_timeout(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(3 * self.heartbeat_interval().as_millis() as i64)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(10)
    }
}
