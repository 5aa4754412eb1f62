// SPDX-License-Identifier: MIT

//! Spawn, monitor, and tear down sandbox processes (§4.2).

use crate::isolation::{bwrap_available, wrap_command};
use crate::layout::SandboxPaths;
use crate::limits::{CgroupHandle, DiskMonitor};
use crate::SandboxError;
use ash_core::sandbox::CreateSandboxRequest;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{info, warn};

/// How long `destroy` waits after a `shutdown` command before escalating to
/// SIGTERM, and after SIGTERM before SIGKILL (§4.2).
const TEARDOWN_GRACE: Duration = Duration::from_secs(5);

/// How exit was classified (§4.2): OOM is `SIGKILL` or exit code 137;
/// anything else non-zero is a crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClassification {
    Clean,
    Oom,
    Crash(i32),
}

pub fn classify_exit(status: std::process::ExitStatus) -> ExitClassification {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if status.signal() == Some(libc::SIGKILL) {
            return ExitClassification::Oom;
        }
    }
    match status.code() {
        Some(0) => ExitClassification::Clean,
        Some(137) => ExitClassification::Oom,
        Some(code) => ExitClassification::Crash(code),
        None => ExitClassification::Crash(-1),
    }
}

#[derive(Debug, Clone)]
pub struct SandboxRuntimeConfig {
    pub sandboxes_dir: PathBuf,
    pub data_dir: PathBuf,
    pub bridge_entry: PathBuf,
    pub socket_connect_timeout: Duration,
    pub disk_poll_interval: Duration,
}

/// A live sandbox process, owned exclusively by whoever called `spawn`
/// (the pool, in practice).
pub struct SandboxHandle {
    pub paths: SandboxPaths,
    child: Option<Child>,
    _cgroup: Option<CgroupHandle>,
    _disk_monitor: Option<DiskMonitor>,
}

impl SandboxHandle {
    /// Whether the underlying process is still alive. Reaps the child
    /// without blocking if it has already exited.
    pub fn is_alive(&mut self) -> bool {
        match &mut self.child {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(|c| c.id())
    }

    /// Non-blocking reap: if the process has exited, consume the child and
    /// classify how (§4.2 OOM detection). Returns `None` while the process
    /// is still alive (or already reaped), which is the common case in the
    /// pool's lazy `get()`/liveness-sweep checks (§3 "Get").
    pub fn try_reap(&mut self) -> Option<ExitClassification> {
        let child = self.child.as_mut()?;
        match child.try_wait() {
            Ok(Some(status)) => {
                self.child = None;
                Some(classify_exit(status))
            }
            _ => None,
        }
    }
}

pub struct SandboxRuntime {
    config: SandboxRuntimeConfig,
}

impl SandboxRuntime {
    pub fn new(config: SandboxRuntimeConfig) -> Self {
        Self { config }
    }

    /// Compute a sandbox's directory layout without spawning anything: used
    /// by the pool to know a workspace path ahead of `spawn`, and by the
    /// cold-cleanup sweep to remove a dead sandbox's files by id alone.
    pub fn paths_for(&self, id: &str) -> SandboxPaths {
        SandboxPaths::new(&self.config.sandboxes_dir, id)
    }

    /// Spawn a sandbox process for `req`, returning once the child is
    /// running (not once the bridge has handshaked — that is the pool's
    /// `warming -> warm` transition, driven by `BridgeClient::connect`).
    pub fn spawn<F>(&self, req: &CreateSandboxRequest, on_oom: F) -> Result<SandboxHandle, SandboxError>
    where
        F: Fn() + Send + 'static,
    {
        let paths = SandboxPaths::new(&self.config.sandboxes_dir, req.id.as_str());
        paths.prepare(&req.agent_dir, req.skip_agent_copy).map_err(SandboxError::Layout)?;

        let host_env: Vec<(String, String)> = std::env::vars().collect();
        let env = crate::env::build_env(
            &host_env,
            req.id.as_str(),
            &req.agent_dir.to_string_lossy(),
            &paths.workspace.to_string_lossy(),
            &req.extra_env,
        );

        let inner_argv = vec![
            self.config.bridge_entry.to_string_lossy().into_owned(),
            "--socket".to_string(),
            paths.socket.to_string_lossy().into_owned(),
        ];

        let mut command: std::process::Command = match bwrap_available() {
            Some(bwrap_path) => wrap_command(&bwrap_path, &self.config.data_dir, req.id.as_str(), &inner_argv),
            None => {
                warn!(sandbox_id = %req.id, "bwrap not available; spawning without isolation jail");
                let mut cmd = std::process::Command::new(&inner_argv[0]);
                cmd.args(&inner_argv[1..]);
                cmd
            }
        };

        command.env_clear();
        for (key, value) in &env {
            command.env(key, value);
        }
        command.current_dir(&paths.workspace);

        let mut tokio_command = Command::from(command);
        tokio_command.kill_on_drop(false);
        let child = tokio_command.spawn().map_err(SandboxError::Spawn)?;

        let cgroup = CgroupHandle::create(req.id.as_str(), &req.limits);
        if let (Some(cgroup), Some(pid)) = (&cgroup, child.id()) {
            if let Err(err) = cgroup.add_pid(pid) {
                warn!(sandbox_id = %req.id, %err, "failed to add sandbox pid to cgroup");
            }
        }

        let disk_monitor = Some(DiskMonitor::spawn(
            paths.workspace.clone(),
            req.limits.disk_mb,
            self.config.disk_poll_interval,
            on_oom,
        ));

        info!(sandbox_id = %req.id, pid = ?child.id(), "sandbox process spawned");
        Ok(SandboxHandle { paths, child: Some(child), _cgroup: cgroup, _disk_monitor: disk_monitor })
    }

    /// Wait (bounded) for the bridge socket to become connectable.
    pub async fn wait_for_socket(&self, handle: &SandboxHandle) -> Result<(), SandboxError> {
        let deadline = tokio::time::Instant::now() + self.config.socket_connect_timeout;
        loop {
            if tokio::net::UnixStream::connect(&handle.paths.socket).await.is_ok() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(SandboxError::ConnectTimeout {
                    path: handle.paths.socket.to_string_lossy().into_owned(),
                    timeout_ms: self.config.socket_connect_timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Tear down a sandbox: best-effort `shutdown` over the bridge socket
    /// (left to the caller, which owns the `BridgeClient`), then escalate
    /// SIGTERM -> SIGKILL. The workspace directory is left intact (§4.2).
    pub async fn destroy(&self, mut handle: SandboxHandle) {
        let Some(mut child) = handle.child.take() else { return };
        let Some(pid) = child.id() else { return };

        if tokio::time::timeout(TEARDOWN_GRACE, child.wait()).await.is_ok() {
            return;
        }

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;
            let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
        }
        if tokio::time::timeout(TEARDOWN_GRACE, child.wait()).await.is_ok() {
            return;
        }

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;
            let _ = kill(Pid::from_raw(pid as i32), Signal::SIGKILL);
        }
        let _ = child.wait().await;
    }
}
