//! Scenario 6 (§8): a client that never drains its SSE response still sees
//! the stream terminate (`writeSSE` times out rather than blocking
//! forever), and the sandbox falls back to `waiting` instead of staying
//! `running` indefinitely.

use crate::support::{sample_agent_dir, Daemon};
use serde_json::json;

#[tokio::test]
async fn slow_reader_does_not_wedge_the_sandbox() {
    let daemon = Daemon::start().await;
    let agent_dir = sample_agent_dir();
    daemon.post_json("/api/agents", json!({ "name": "a", "path": agent_dir.path().to_string_lossy() })).await;

    let resp = daemon.post_json("/api/sessions", json!({ "agent": "a" })).await;
    let session: serde_json::Value = resp.json().await.unwrap();
    let session_id = session["id"].as_str().unwrap().to_string();

    let resp = daemon
        .post_json(&format!("/api/sessions/{session_id}/messages"), json!({ "content": "hi" }))
        .await;
    assert_eq!(resp.status(), 200);

    // Drop the response without reading its body: the same as a client
    // that connects and never drains.
    drop(resp);

    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
    loop {
        let resp = daemon.get(&format!("/api/sessions/{session_id}")).await;
        let session: serde_json::Value = resp.json().await.unwrap();
        if session["status"] == "active" {
            break;
        }
        if std::time::Instant::now() > deadline {
            panic!("session never recovered from an abandoned SSE reader");
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
}
