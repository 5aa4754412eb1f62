//! Scenarios 2 and 3 (§8): pause/resume within one process (warm resume,
//! same sandbox id) and pause → restart the host → resume (cold resume,
//! new sandbox id, restored from the on-disk workspace snapshot).

use crate::support::{sample_agent_dir, Daemon};
use serde_json::json;

async fn create_active_session(daemon: &Daemon, agent_dir: &std::path::Path) -> (String, String) {
    let resp = daemon.post_json("/api/agents", json!({ "name": "a", "path": agent_dir.to_string_lossy() })).await;
    assert_eq!(resp.status(), 201);

    let resp = daemon.post_json("/api/sessions", json!({ "agent": "a" })).await;
    assert_eq!(resp.status(), 201);
    let session: serde_json::Value = resp.json().await.unwrap();
    let session_id = session["id"].as_str().unwrap().to_string();
    let sandbox_id = session["sandbox_id"].as_str().unwrap_or_default().to_string();
    (session_id, sandbox_id)
}

#[tokio::test]
async fn warm_resume_keeps_the_same_sandbox() {
    let daemon = Daemon::start().await;
    let agent_dir = sample_agent_dir();
    let (session_id, sandbox_id) = create_active_session(&daemon, agent_dir.path()).await;

    let resp = daemon.post_json(&format!("/api/sessions/{session_id}/pause"), json!({})).await;
    assert_eq!(resp.status(), 204);

    let resp = daemon.post_json(&format!("/api/sessions/{session_id}/resume"), json!({})).await;
    assert_eq!(resp.status(), 200);
    let resumed: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(resumed["status"], "active");
    assert_eq!(resumed["sandbox_id"], sandbox_id, "a warm resume reuses the sandbox that was still pooled");
}

#[tokio::test]
async fn resume_on_ended_session_is_410() {
    let daemon = Daemon::start().await;
    let agent_dir = sample_agent_dir();
    let (session_id, _) = create_active_session(&daemon, agent_dir.path()).await;

    let resp = daemon.delete(&format!("/api/sessions/{session_id}")).await;
    assert_eq!(resp.status(), 204);

    let resp = daemon.post_json(&format!("/api/sessions/{session_id}/resume"), json!({})).await;
    assert_eq!(resp.status(), 410);
}

#[tokio::test]
async fn cold_resume_after_restart_gets_a_new_sandbox() {
    let daemon = Daemon::start().await;
    let agent_dir = sample_agent_dir();
    let (session_id, sandbox_id) = create_active_session(&daemon, agent_dir.path()).await;

    let resp = daemon.post_json(&format!("/api/sessions/{session_id}/pause"), json!({})).await;
    assert_eq!(resp.status(), 204);

    let data_dir = daemon.data_dir.clone();
    let temp = daemon.stop();

    let workspace = data_dir.join("sessions").join(&session_id).join("workspace");
    assert!(workspace.exists(), "pausing should have snapshotted the workspace to disk");

    let daemon = Daemon::restart(temp).await;

    let resp = daemon.post_json(&format!("/api/sessions/{session_id}/resume"), json!({})).await;
    assert_eq!(resp.status(), 200);
    let resumed: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(resumed["status"], "active");
    assert_ne!(resumed["sandbox_id"], sandbox_id, "a cold resume after restart must allocate a fresh sandbox");
}
