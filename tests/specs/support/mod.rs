//! Shared harness for the end-to-end scenarios (§8): spawn a real `ashd`
//! against a scratch SQLite file and data dir, poll `/health` until it's up,
//! and give each spec a small async client over its HTTP/SSE surface.

use assert_cmd::cargo::cargo_bin;
use serde_json::Value;
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Child, Stdio};
use std::time::Duration;
use tempfile::TempDir;

pub struct Daemon {
    child: Child,
    pub base_url: String,
    pub data_dir: PathBuf,
    /// `None` only in the instant between `stop`/`kill` taking it and the
    /// struct itself being dropped.
    temp: Option<TempDir>,
    http: reqwest::Client,
}

/// Binds an ephemeral port without holding onto it, so `ashd` can bind its
/// own listener on the same number a moment later. Good enough for a test
/// harness; a real allocator would need a reservation, not a release.
fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    listener.local_addr().unwrap().port()
}

impl Daemon {
    /// Starts `ashd` in standalone mode with a fresh data dir and no auth,
    /// and blocks until `/health` answers.
    pub async fn start() -> Self {
        let temp = TempDir::new().expect("tempdir");
        Self::start_in(temp, &[]).await
    }

    pub async fn start_with(extra_env: &[(&str, &str)]) -> Self {
        let temp = TempDir::new().expect("tempdir");
        Self::start_in(temp, extra_env).await
    }

    /// Starts (or restarts, for the cold-resume scenario) `ashd` against an
    /// existing scratch dir, so the on-disk session workspace and sqlite
    /// file from a prior run survive the restart.
    async fn start_in(temp: TempDir, extra_env: &[(&str, &str)]) -> Self {
        let data_dir = temp.path().join("data");
        std::fs::create_dir_all(&data_dir).unwrap();
        let port = free_port();
        let database_url = format!("sqlite://{}?mode=rwc", temp.path().join("ash.db").display());

        let mut cmd = std::process::Command::new(cargo_bin("ashd"));
        cmd.env("ASH_HOST", "127.0.0.1")
            .env("ASH_PORT", port.to_string())
            .env("ASH_DATA_DIR", &data_dir)
            .env("ASH_DATABASE_URL", &database_url)
            .env("ASH_MODE", "standalone")
            .env("RUST_LOG", "warn")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in extra_env {
            cmd.env(key, value);
        }

        let child = cmd.spawn().expect("spawn ashd");
        let base_url = format!("http://127.0.0.1:{port}");
        let http = reqwest::Client::new();

        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        loop {
            if http.get(format!("{base_url}/health")).send().await.is_ok() {
                break;
            }
            if std::time::Instant::now() > deadline {
                panic!("ashd did not become healthy within 10s");
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        Daemon { child, base_url, data_dir, temp: Some(temp), http }
    }

    pub async fn restart(temp: TempDir) -> Self {
        Self::start_in(temp, &[]).await
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn post_json(&self, path: &str, body: Value) -> reqwest::Response {
        self.http.post(self.url(path)).json(&body).send().await.expect("request")
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.http.get(self.url(path)).send().await.expect("request")
    }

    pub async fn delete(&self, path: &str) -> reqwest::Response {
        self.http.delete(self.url(path)).send().await.expect("request")
    }

    /// Sends a SIGTERM-equivalent shutdown and waits for the process to
    /// exit, so "restart the host process" scenarios can bring it back up
    /// against the same data dir.
    pub fn stop(mut self) -> TempDir {
        #[cfg(unix)]
        {
            // SAFETY: `self.child.id()` names a process this harness owns and
            // has not yet reaped.
            unsafe {
                libc::kill(self.child.id() as libc::pid_t, libc::SIGTERM);
            }
        }
        #[cfg(not(unix))]
        {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
        self.temp.take().expect("temp dir taken twice")
    }

    /// Hard-kills the process without deregistering, simulating a crashed
    /// runner for the dead-runner/cold-resume scenarios.
    pub fn kill(mut self) -> TempDir {
        let _ = self.child.kill();
        let _ = self.child.wait();
        self.temp.take().expect("temp dir taken twice")
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Collects SSE `data:` payloads from a streamed response body until the
/// stream ends, same framing `ash-cli`'s client parses.
pub async fn collect_sse_events(resp: reqwest::Response) -> Vec<(String, String)> {
    use futures_util::StreamExt;

    let mut events = Vec::new();
    let mut buf = String::new();
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.expect("chunk");
        buf.push_str(&String::from_utf8_lossy(&chunk));
        while let Some(idx) = buf.find("\n\n") {
            let record: String = buf.drain(..idx + 2).collect();
            let mut event_name = "message".to_string();
            let mut data = String::new();
            for line in record.lines() {
                if let Some(rest) = line.strip_prefix("event:") {
                    event_name = rest.trim().to_string();
                } else if let Some(rest) = line.strip_prefix("data:") {
                    data = rest.trim().to_string();
                }
            }
            events.push((event_name, data));
        }
    }
    events
}

/// Writes a minimal deployable agent directory (just the descriptor file
/// `ash-core` requires) under a fresh tempdir and returns its path.
pub fn sample_agent_dir() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(dir.path().join("CLAUDE.md"), "# sample agent\n").unwrap();
    dir
}
