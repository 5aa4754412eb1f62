// SPDX-License-Identifier: MIT

//! Env allowlist construction for sandbox child processes (§4.2, §8).
//!
//! The child env is built from scratch, never inherited wholesale: only a
//! fixed allowlist passes through from the host, plus explicit sandbox
//! identity vars, plus caller-supplied extra env merged last.

/// Host env vars that pass through unchanged, when present.
const PASSTHROUGH: &[&str] =
    &["PATH", "HOME", "LANG", "TERM", "NODE_PATH", "ANTHROPIC_API_KEY", "ANTHROPIC_BASE_URL", "ANTHROPIC_CUSTOM_HEADERS"];

/// Build the child process environment for a sandbox.
///
/// `host_env` is the candidate source (normally `std::env::vars()`, passed
/// in so tests can supply a synthetic env instead of mutating the real
/// process env). `extra_env` is merged last and can override anything
/// above it, including the sandbox identity vars.
pub fn build_env(
    host_env: &[(String, String)],
    sandbox_id: &str,
    agent_dir: &str,
    workspace_dir: &str,
    extra_env: &[(String, String)],
) -> Vec<(String, String)> {
    let mut out = Vec::new();

    for (key, value) in host_env {
        if PASSTHROUGH.contains(&key.as_str()) || key.starts_with("ASH_") {
            out.push((key.clone(), value.clone()));
        }
    }

    out.push(("ASH_SANDBOX_ID".to_string(), sandbox_id.to_string()));
    out.push(("ASH_AGENT_DIR".to_string(), agent_dir.to_string()));
    out.push(("ASH_WORKSPACE_DIR".to_string(), workspace_dir.to_string()));

    for (key, value) in extra_env {
        if let Some(existing) = out.iter_mut().find(|(k, _)| k == key) {
            existing.1 = value.clone();
        } else {
            out.push((key.clone(), value.clone()));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXCLUDED: &[&str] = &[
        "AWS_SECRET_ACCESS_KEY",
        "AWS_ACCESS_KEY_ID",
        "SSH_AUTH_SOCK",
        "GITHUB_TOKEN",
        "DATABASE_URL",
        "PGPASSWORD",
        "NPM_TOKEN",
        "REDIS_URL",
        "OPENAI_API_KEY",
        "STRIPE_SECRET_KEY",
        "DOCKER_HOST",
    ];

    fn poisoned_host_env() -> Vec<(String, String)> {
        let mut env: Vec<(String, String)> =
            EXCLUDED.iter().map(|k| (k.to_string(), "leaked".to_string())).collect();
        env.push(("PATH".into(), "/usr/bin".into()));
        env.push(("ANTHROPIC_API_KEY".into(), "sk-ant-test".into()));
        env.push(("ASH_DEBUG_TIMING".into(), "1".into()));
        env.push(("RANDOM_UNRELATED_VAR".into(), "noise".into()));
        env
    }

    #[test]
    fn excludes_every_listed_secret_regardless_of_host_env() {
        let env = build_env(&poisoned_host_env(), "sbx-1", "/agents/a", "/sandboxes/sbx-1/workspace", &[]);
        for excluded in EXCLUDED {
            assert!(!env.iter().any(|(k, _)| k == excluded), "{excluded} leaked into sandbox env");
        }
    }

    #[test]
    fn includes_passthrough_and_ash_star_and_identity_vars() {
        let env = build_env(&poisoned_host_env(), "sbx-1", "/agents/a", "/sandboxes/sbx-1/workspace", &[]);
        let get = |k: &str| env.iter().find(|(key, _)| key == k).map(|(_, v)| v.clone());

        assert_eq!(get("PATH"), Some("/usr/bin".to_string()));
        assert_eq!(get("ANTHROPIC_API_KEY"), Some("sk-ant-test".to_string()));
        assert_eq!(get("ASH_DEBUG_TIMING"), Some("1".to_string()));
        assert_eq!(get("ASH_SANDBOX_ID"), Some("sbx-1".to_string()));
        assert_eq!(get("ASH_AGENT_DIR"), Some("/agents/a".to_string()));
        assert_eq!(get("ASH_WORKSPACE_DIR"), Some("/sandboxes/sbx-1/workspace".to_string()));
        assert!(get("RANDOM_UNRELATED_VAR").is_none());
    }

    #[test]
    fn extra_env_is_merged_last_and_can_override_identity_vars() {
        let env = build_env(
            &[],
            "sbx-1",
            "/agents/a",
            "/sandboxes/sbx-1/workspace",
            &[("ASH_SANDBOX_ID".into(), "overridden".into()), ("FOO".into(), "bar".into())],
        );
        let get = |k: &str| env.iter().find(|(key, _)| key == k).map(|(_, v)| v.clone());
        assert_eq!(get("ASH_SANDBOX_ID"), Some("overridden".to_string()));
        assert_eq!(get("FOO"), Some("bar".to_string()));
    }

    #[test]
    fn absent_optional_secret_on_host_never_appears() {
        let env = build_env(&[], "sbx-1", "/agents/a", "/ws", &[]);
        assert!(!env.iter().any(|(k, _)| k == "ANTHROPIC_API_KEY"));
    }
}
