//! Scenario 1 (§8): deploy an agent, create a session against it, send a
//! message and read the SSE stream to `done`, then end the session.

use crate::support::{collect_sse_events, sample_agent_dir, Daemon};
use serde_json::json;

#[tokio::test]
async fn deploy_message_end() {
    let daemon = Daemon::start().await;
    let agent_dir = sample_agent_dir();

    let resp = daemon
        .post_json("/api/agents", json!({ "name": "a", "path": agent_dir.path().to_string_lossy() }))
        .await;
    assert_eq!(resp.status(), 201);

    let resp = daemon.post_json("/api/sessions", json!({ "agent": "a" })).await;
    assert_eq!(resp.status(), 201);
    let session: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(session["status"], "active");
    let session_id = session["id"].as_str().unwrap().to_string();

    let resp = daemon
        .post_json(&format!("/api/sessions/{session_id}/messages"), json!({ "content": "hi" }))
        .await;
    assert_eq!(resp.status(), 200);
    let events = collect_sse_events(resp).await;
    assert!(events.iter().any(|(name, _)| name == "message"), "expected at least one message event");
    assert!(events.iter().any(|(name, _)| name == "done"), "expected a terminal done event");

    let resp = daemon.delete(&format!("/api/sessions/{session_id}")).await;
    assert_eq!(resp.status(), 204);

    let resp = daemon.get(&format!("/api/sessions/{session_id}")).await;
    let session: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(session["status"], "ended");
}

#[tokio::test]
async fn unknown_agent_is_404() {
    let daemon = Daemon::start().await;
    let resp = daemon.post_json("/api/sessions", json!({ "agent": "does-not-exist" })).await;
    assert_eq!(resp.status(), 404);
}
