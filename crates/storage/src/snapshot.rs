// SPDX-License-Identifier: MIT

//! Snapshot a sandbox workspace to `<dataDir>/sessions/<id>/workspace/`,
//! and restore it back out later (§4.5, §6.4).

use crate::StorageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory/file names skipped when snapshotting: ephemeral build/runtime
/// artifacts that are large, machine-specific, or actively in use.
const SKIP_DIR_NAMES: &[&str] =
    &["node_modules", ".git", "__pycache__", ".cache", ".venv", "venv", "target", "dist", ".next"];

fn is_skipped_file(name: &str) -> bool {
    name.ends_with(".sock") || name.ends_with(".lock") || name.ends_with(".pid")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotMeta {
    pub session_id: String,
    pub agent_name: String,
    pub persisted_at: DateTime<Utc>,
}

fn session_snapshot_dir(data_dir: &Path, session_id: &str) -> PathBuf {
    data_dir.join("sessions").join(session_id).join("workspace")
}

fn session_meta_path(data_dir: &Path, session_id: &str) -> PathBuf {
    data_dir.join("sessions").join(session_id).join("meta.json")
}

/// Copy `workspace_dir` into the session's durable snapshot directory,
/// skipping ephemeral entries, and write `meta.json`. Idempotent: replaces
/// any previous snapshot for this session.
pub async fn persist_session_state(
    data_dir: &Path,
    session_id: &str,
    workspace_dir: &Path,
    agent_name: &str,
) -> Result<(), StorageError> {
    let dest = session_snapshot_dir(data_dir, session_id);
    if dest.exists() {
        tokio::fs::remove_dir_all(&dest).await?;
    }
    tokio::fs::create_dir_all(&dest).await?;
    copy_filtered(workspace_dir, &dest).await?;

    let meta = SnapshotMeta {
        session_id: session_id.to_string(),
        agent_name: agent_name.to_string(),
        persisted_at: Utc::now(),
    };
    let meta_path = session_meta_path(data_dir, session_id);
    tokio::fs::write(&meta_path, serde_json::to_vec_pretty(&meta).map_err(std::io::Error::from)?).await?;
    Ok(())
}

/// Copy the session's snapshot into `target_dir`, creating parent
/// directories as needed. Returns whether a snapshot existed.
pub async fn restore_session_state(
    data_dir: &Path,
    session_id: &str,
    target_dir: &Path,
) -> Result<bool, StorageError> {
    let src = session_snapshot_dir(data_dir, session_id);
    if !src.exists() {
        return Ok(false);
    }
    if let Some(parent) = target_dir.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::create_dir_all(target_dir).await?;
    copy_filtered(&src, target_dir).await?;
    Ok(true)
}

async fn copy_filtered(src: &Path, dest: &Path) -> Result<(), StorageError> {
    let mut entries = tokio::fs::read_dir(src).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        let file_type = entry.file_type().await?;

        if file_type.is_dir() {
            if SKIP_DIR_NAMES.contains(&name_str.as_ref()) {
                continue;
            }
            let dest_child = dest.join(&name);
            tokio::fs::create_dir_all(&dest_child).await?;
            Box::pin(copy_filtered(&entry.path(), &dest_child)).await?;
        } else {
            if is_skipped_file(&name_str) {
                continue;
            }
            tokio::fs::copy(entry.path(), dest.join(&name)).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn write_workspace(dir: &Path) {
        tokio::fs::write(dir.join("CLAUDE.md"), "# agent").await.unwrap();
        tokio::fs::create_dir(dir.join("node_modules")).await.unwrap();
        tokio::fs::write(dir.join("node_modules/pkg.js"), "junk").await.unwrap();
        tokio::fs::create_dir(dir.join(".git")).await.unwrap();
        tokio::fs::write(dir.join(".git/HEAD"), "ref: refs/heads/main").await.unwrap();
        tokio::fs::write(dir.join("bridge.sock"), "").await.unwrap();
        tokio::fs::write(dir.join("daemon.lock"), "").await.unwrap();
        tokio::fs::create_dir(dir.join("src")).await.unwrap();
        tokio::fs::write(dir.join("src/main.rs"), "fn main() {}").await.unwrap();
    }

    #[tokio::test]
    async fn persist_skips_ephemeral_entries_and_writes_meta() {
        let data_dir = tempdir().unwrap();
        let workspace = tempdir().unwrap();
        write_workspace(workspace.path()).await;

        persist_session_state(data_dir.path(), "ses-1", workspace.path(), "agent-a").await.unwrap();

        let snapshot = session_snapshot_dir(data_dir.path(), "ses-1");
        assert!(snapshot.join("CLAUDE.md").is_file());
        assert!(snapshot.join("src/main.rs").is_file());
        assert!(!snapshot.join("node_modules").exists());
        assert!(!snapshot.join(".git").exists());
        assert!(!snapshot.join("bridge.sock").exists());
        assert!(!snapshot.join("daemon.lock").exists());

        let meta_path = session_meta_path(data_dir.path(), "ses-1");
        let meta: SnapshotMeta = serde_json::from_slice(&tokio::fs::read(meta_path).await.unwrap()).unwrap();
        assert_eq!(meta.session_id, "ses-1");
        assert_eq!(meta.agent_name, "agent-a");
    }

    #[tokio::test]
    async fn restore_returns_false_when_no_snapshot_exists() {
        let data_dir = tempdir().unwrap();
        let target = tempdir().unwrap();
        let existed = restore_session_state(data_dir.path(), "ses-missing", target.path()).await.unwrap();
        assert!(!existed);
    }

    #[tokio::test]
    async fn restore_round_trips_persisted_workspace() {
        let data_dir = tempdir().unwrap();
        let workspace = tempdir().unwrap();
        write_workspace(workspace.path()).await;
        persist_session_state(data_dir.path(), "ses-1", workspace.path(), "agent-a").await.unwrap();

        let target = tempdir().unwrap();
        let fresh_target = target.path().join("nested/workspace");
        let existed = restore_session_state(data_dir.path(), "ses-1", &fresh_target).await.unwrap();

        assert!(existed);
        assert!(fresh_target.join("CLAUDE.md").is_file());
        assert!(fresh_target.join("src/main.rs").is_file());
    }

    #[tokio::test]
    async fn re_persisting_overwrites_previous_snapshot() {
        let data_dir = tempdir().unwrap();
        let workspace = tempdir().unwrap();
        tokio::fs::write(workspace.path().join("v1.txt"), "one").await.unwrap();
        persist_session_state(data_dir.path(), "ses-1", workspace.path(), "agent-a").await.unwrap();

        tokio::fs::remove_file(workspace.path().join("v1.txt")).await.unwrap();
        tokio::fs::write(workspace.path().join("v2.txt"), "two").await.unwrap();
        persist_session_state(data_dir.path(), "ses-1", workspace.path(), "agent-a").await.unwrap();

        let snapshot = session_snapshot_dir(data_dir.path(), "ses-1");
        assert!(!snapshot.join("v1.txt").exists());
        assert!(snapshot.join("v2.txt").is_file());
    }
}
