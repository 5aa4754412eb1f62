//! Scenario 4 (§8): with `ASH_MAX_SANDBOXES=2`, a third session still
//! succeeds by evicting the oldest warm sandbox, which becomes `paused`
//! with its workspace snapshotted to disk.

use crate::support::{sample_agent_dir, Daemon};
use serde_json::json;

#[tokio::test]
async fn third_session_evicts_the_oldest_warm_one() {
    let daemon = Daemon::start_with(&[("ASH_MAX_SANDBOXES", "2")]).await;
    let agent_dir = sample_agent_dir();
    daemon.post_json("/api/agents", json!({ "name": "a", "path": agent_dir.path().to_string_lossy() })).await;

    let mut session_ids = Vec::new();
    for _ in 0..3 {
        let resp = daemon.post_json("/api/sessions", json!({ "agent": "a" })).await;
        assert_eq!(resp.status(), 201, "the pool must evict rather than reject the third session");
        let session: serde_json::Value = resp.json().await.unwrap();
        session_ids.push(session["id"].as_str().unwrap().to_string());
    }

    let oldest = &session_ids[0];
    let resp = daemon.get(&format!("/api/sessions/{oldest}")).await;
    let session: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(session["status"], "paused", "eviction pauses the session rather than ending it");

    let workspace = daemon.data_dir.join("sessions").join(oldest).join("workspace");
    assert!(workspace.exists(), "an evicted session's workspace must be snapshotted before its sandbox is destroyed");
}
