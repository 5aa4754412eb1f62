// SPDX-License-Identifier: MIT

//! Per-sandbox directory layout (§4.2, §6.4):
//! `<sandboxesDir>/<id>/{workspace,logs,bridge.sock}`.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct SandboxPaths {
    pub root: PathBuf,
    pub workspace: PathBuf,
    pub logs: PathBuf,
    pub socket: PathBuf,
}

impl SandboxPaths {
    pub fn new(sandboxes_dir: &Path, id: &str) -> Self {
        let root = sandboxes_dir.join(id);
        Self {
            workspace: root.join("workspace"),
            logs: root.join("logs"),
            socket: root.join("bridge.sock"),
            root,
        }
    }

    /// Create `workspace/` and `logs/`, and unless `skip_copy`, populate
    /// `workspace/` from `agent_dir`.
    pub fn prepare(&self, agent_dir: &Path, skip_copy: bool) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.workspace)?;
        std::fs::create_dir_all(&self.logs)?;
        if !skip_copy {
            copy_dir_recursive(agent_dir, &self.workspace)?;
        }
        Ok(())
    }

    /// Remove the whole sandbox directory tree, tolerating races with
    /// concurrent deletion (best-effort per §9 "Scoped resources").
    pub fn remove_all(&self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let dst_path = dst.join(entry.file_name());
        if file_type.is_dir() {
            copy_dir_recursive(&entry.path(), &dst_path)?;
        } else if file_type.is_symlink() {
            let target = std::fs::read_link(entry.path())?;
            #[cfg(unix)]
            std::os::unix::fs::symlink(target, &dst_path)?;
            #[cfg(not(unix))]
            std::fs::copy(entry.path(), &dst_path).map(|_| ())?;
            let _ = target;
        } else {
            std::fs::copy(entry.path(), &dst_path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn prepare_creates_workspace_and_logs_and_copies_agent_dir() {
        let sandboxes_dir = tempdir().unwrap();
        let agent_dir = tempdir().unwrap();
        std::fs::write(agent_dir.path().join("CLAUDE.md"), "# agent").unwrap();
        std::fs::create_dir(agent_dir.path().join("sub")).unwrap();
        std::fs::write(agent_dir.path().join("sub/file.txt"), "hi").unwrap();

        let paths = SandboxPaths::new(sandboxes_dir.path(), "sbx-1");
        paths.prepare(agent_dir.path(), false).unwrap();

        assert!(paths.workspace.join("CLAUDE.md").is_file());
        assert!(paths.workspace.join("sub/file.txt").is_file());
        assert!(paths.logs.is_dir());
    }

    #[test]
    fn skip_copy_leaves_workspace_empty() {
        let sandboxes_dir = tempdir().unwrap();
        let agent_dir = tempdir().unwrap();
        std::fs::write(agent_dir.path().join("CLAUDE.md"), "# agent").unwrap();

        let paths = SandboxPaths::new(sandboxes_dir.path(), "sbx-1");
        paths.prepare(agent_dir.path(), true).unwrap();

        assert!(paths.workspace.is_dir());
        assert!(std::fs::read_dir(&paths.workspace).unwrap().next().is_none());
    }

    #[test]
    fn remove_all_is_best_effort_on_already_missing_dir() {
        let sandboxes_dir = tempdir().unwrap();
        let paths = SandboxPaths::new(sandboxes_dir.path(), "sbx-missing");
        paths.remove_all(); // must not panic even though nothing exists
    }
}
