// SPDX-License-Identifier: MIT

//! Isolation wrapper construction (§4.2): when a `bwrap`-like jail is
//! available, the sandbox process sees a masked, per-sandbox view of the
//! data directory.

use std::path::Path;
use std::process::Command;

/// Locate `bwrap` on `PATH`. Returns `None` when unavailable, in which case
/// the runtime spawns the bridge unwrapped (best-effort isolation only).
pub fn bwrap_available() -> Option<std::path::PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path).map(|dir| dir.join("bwrap")).find(|candidate| candidate.is_file())
}

/// Build a `bwrap` invocation that wraps `inner_argv` so the child sees:
/// read-only OS dirs, a fresh `/proc`, its own `/tmp`, and *only* its own
/// `sandboxes/<id>/` directory bind-mounted back into an otherwise masked
/// data directory (§4.2).
pub fn wrap_command(
    bwrap_path: &Path,
    data_dir: &Path,
    sandbox_id: &str,
    inner_argv: &[String],
) -> Command {
    let mut cmd = Command::new(bwrap_path);
    let sandbox_dir = data_dir.join("sandboxes").join(sandbox_id);

    cmd.arg("--ro-bind").arg("/usr").arg("/usr");
    cmd.arg("--ro-bind").arg("/lib").arg("/lib");
    if Path::new("/lib64").is_dir() {
        cmd.arg("--ro-bind").arg("/lib64").arg("/lib64");
    }
    cmd.arg("--proc").arg("/proc");
    cmd.arg("--tmpfs").arg("/tmp");
    // Mask the parent data directory, then bind back only this sandbox's
    // own directory: other agents/sessions/sandboxes stay invisible.
    cmd.arg("--tmpfs").arg(&data_dir);
    cmd.arg("--bind").arg(&sandbox_dir).arg(&sandbox_dir);
    cmd.arg("--unshare-pid");
    cmd.arg("--unshare-net");
    cmd.arg("--die-with-parent");

    if let Some((program, args)) = inner_argv.split_first() {
        cmd.arg(program);
        cmd.args(args);
    }
    cmd
}
