// SPDX-License-Identifier: MIT

//! Resource limit enforcement (§4.2): a per-sandbox cgroup on Linux with
//! cgroups v2, and a disk-usage poller independent of cgroups (there is no
//! cgroup controller for "bytes under this directory").

use ash_core::ResourceLimits;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::warn;

const CGROUP_ROOT: &str = "/sys/fs/cgroup";

/// A cgroup v2 leaf created for one sandbox. Enforces memory, pid, and
/// cpu.max limits; cleaned up on drop (best-effort, §9 "Scoped resources").
pub struct CgroupHandle {
    path: PathBuf,
}

impl CgroupHandle {
    /// Whether cgroups v2 is usable at all on this host.
    pub fn v2_available() -> bool {
        Path::new(CGROUP_ROOT).join("cgroup.controllers").is_file()
    }

    /// Create `<CGROUP_ROOT>/ash/<id>/` and write its limits. Returns
    /// `None` (not an error) when cgroups v2 is unavailable; callers fall
    /// back to best-effort per-process limits in that case.
    pub fn create(sandbox_id: &str, limits: &ResourceLimits) -> Option<Self> {
        if !Self::v2_available() {
            return None;
        }
        let path = Path::new(CGROUP_ROOT).join("ash").join(sandbox_id);
        if let Err(err) = std::fs::create_dir_all(&path) {
            warn!(sandbox_id, %err, "failed to create cgroup; continuing without it");
            return None;
        }
        let handle = Self { path };
        handle.write_limit("memory.max", &(limits.memory_mb * 1024 * 1024).to_string());
        handle.write_limit("pids.max", &limits.max_processes.to_string());
        // cpu.max is "<quota> <period>"; cpu_percent% of a 100ms period.
        let quota = (limits.cpu_percent as u64 * 1000).max(1000);
        handle.write_limit("cpu.max", &format!("{quota} 100000"));
        Some(handle)
    }

    fn write_limit(&self, file: &str, value: &str) {
        if let Err(err) = std::fs::write(self.path.join(file), value) {
            warn!(path = %self.path.display(), file, %err, "failed to write cgroup limit");
        }
    }

    /// Add a process to this cgroup.
    pub fn add_pid(&self, pid: u32) -> std::io::Result<()> {
        std::fs::write(self.path.join("cgroup.procs"), pid.to_string())
    }
}

impl Drop for CgroupHandle {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir(&self.path);
    }
}

/// Polls a workspace directory's on-disk size and invokes a callback when
/// it exceeds the configured limit (§4.2).
pub struct DiskMonitor {
    stop_tx: Option<oneshot::Sender<()>>,
}

impl DiskMonitor {
    /// Spawn a background poller. `on_exceeded` is expected to terminate
    /// the sandbox; the monitor itself only observes and signals.
    pub fn spawn<F>(workspace_dir: PathBuf, limit_mb: u64, interval: Duration, on_exceeded: F) -> Self
    where
        F: Fn() + Send + 'static,
    {
        let (stop_tx, mut stop_rx) = oneshot::channel();
        tokio::spawn(async move {
            let limit_bytes = limit_mb * 1024 * 1024;
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = tokio::time::sleep(interval) => {
                        let size = dir_size(&workspace_dir);
                        if size > limit_bytes {
                            on_exceeded();
                            break;
                        }
                    }
                }
            }
        });
        Self { stop_tx: Some(stop_tx) }
    }
}

impl Drop for DiskMonitor {
    fn drop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn dir_size(path: &Path) -> u64 {
    let mut total = 0u64;
    let Ok(entries) = std::fs::read_dir(path) else {
        return 0;
    };
    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else { continue };
        if file_type.is_dir() {
            total += dir_size(&entry.path());
        } else if let Ok(meta) = entry.metadata() {
            total += meta.len();
        }
    }
    total
}
