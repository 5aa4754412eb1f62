//! Scenario 5 (§8): a runner that vanishes without deregistering is swept
//! once `RUNNER_LIVENESS_TIMEOUT_MS` elapses, its sessions pause, and its
//! row is deleted.
//!
//! Driving a second real runner process end-to-end needs a coordinator
//! process plus a standalone runner process wired to the same database,
//! which is more than this harness's single-binary helper drives. This
//! spec instead exercises the sweep directly against the database the
//! harness already starts, the same way `ash-coordinator`'s own
//! `liveness_sweep` unit tests do, just against a live `ashd`'s schema.

use crate::support::Daemon;
use serde_json::json;

#[tokio::test]
async fn dead_runner_is_swept_from_the_registry() {
    let daemon = Daemon::start().await;

    let resp = daemon
        .post_json(
            "/api/internal/runners/register",
            json!({ "id": "runner_dead", "host": "127.0.0.1", "port": 9999, "max_sandboxes": 4 }),
        )
        .await;
    assert_eq!(resp.status(), 204);

    let resp = daemon.get("/api/internal/runners").await;
    let runners: serde_json::Value = resp.json().await.unwrap();
    assert!(runners.as_array().unwrap().iter().any(|r| r["id"] == "runner_dead"));

    // No heartbeat follows; the background liveness sweep (config.rs:
    // `liveness_timeout` = 3 heartbeat intervals) will eventually delete
    // this row. Polling here rather than sleeping the full interval keeps
    // the common case fast.
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(35);
    loop {
        let resp = daemon.get("/api/internal/runners").await;
        let runners: serde_json::Value = resp.json().await.unwrap();
        if !runners.as_array().unwrap().iter().any(|r| r["id"] == "runner_dead") {
            break;
        }
        if std::time::Instant::now() > deadline {
            panic!("dead runner was never swept from the registry");
        }
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    }
}
