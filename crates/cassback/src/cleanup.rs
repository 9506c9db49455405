//! What happens to local data once a whole batch has uploaded
//!
//! Incremental backup files are staging copies and are deleted. Snapshot files
//! are hard links owned by the engine's snapshot bookkeeping, so they are
//! released through the snapshot tool instead of being removed here.

use crate::Result;
use crate::layout::{BackupFile, Tag};
use crate::snapshot::SnapshotTool;
use diagnostics::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupPolicy {
    RemoveStagedFiles,
    ClearSnapshot(Tag),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: usize,
    /// Files that could not be removed, with the reason
    pub failed: Vec<(String, String)>,
    pub snapshot_cleared: Option<Tag>,
}

impl CleanupReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

impl CleanupPolicy {
    /// Apply the policy to a batch that uploaded completely.
    ///
    /// Individual file removals are best effort and only reported; a failing
    /// snapshot release is returned as an error.
    pub async fn apply(
        &self,
        files: &[BackupFile],
        tool: &dyn SnapshotTool,
    ) -> Result<CleanupReport> {
        match self {
            CleanupPolicy::RemoveStagedFiles => Ok(remove_staged_files(files).await),
            CleanupPolicy::ClearSnapshot(tag) => {
                tool.clear_snapshot(tag).await?;
                Ok(CleanupReport {
                    snapshot_cleared: Some(tag.clone()),
                    ..CleanupReport::default()
                })
            }
        }
    }
}

async fn remove_staged_files(files: &[BackupFile]) -> CleanupReport {
    let mut report = CleanupReport::default();
    for file in files {
        let path = file.path.display().to_string();
        match tokio::fs::remove_file(&file.path).await {
            Ok(()) => {
                log_debug!("Removed {path}", path: path.as_str());
                report.removed += 1;
            }
            Err(e) => {
                let reason = e.to_string();
                log_warn!("Could not remove {path}: {reason}", path: path.as_str(), reason: reason.as_str());
                report.failed.push((path, reason));
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BackupError;
    use crate::layout::Category;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        cleared: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl SnapshotTool for Recorder {
        async fn snapshot(&self, _tag: &Tag, _keyspace: Option<&str>) -> Result<()> {
            Ok(())
        }

        async fn clear_snapshot(&self, tag: &Tag) -> Result<()> {
            if self.fail {
                return Err(BackupError::ExternalTool {
                    command: "clearsnapshot".to_string(),
                    status: "exit status: 2".to_string(),
                    stderr: "JMX refused".to_string(),
                });
            }
            self.cleared
                .lock()
                .expect("lock")
                .push(tag.to_string());
            Ok(())
        }
    }

    fn staged(dir: &Path, name: &str) -> BackupFile {
        let path = dir.join(name);
        std::fs::write(&path, b"x").expect("write");
        BackupFile {
            path,
            keyspace: "ks".to_string(),
            table: "t".to_string(),
            file_name: name.to_string(),
            category: Category::Backup,
        }
    }

    #[tokio::test]
    async fn removes_staged_files_and_keeps_directory() -> Result<()> {
        let dir = TempDir::new().expect("tempdir");
        let files = vec![staged(dir.path(), "a.db"), staged(dir.path(), "b.db")];
        let tool = Recorder::default();

        let report = CleanupPolicy::RemoveStagedFiles.apply(&files, &tool).await?;
        assert_eq!(report.removed, 2);
        assert!(report.is_complete());
        assert!(files.iter().all(|f| !f.path.exists()));
        assert!(dir.path().is_dir());
        assert!(tool.cleared.lock().expect("lock").is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn removal_failures_are_reported_not_returned() -> Result<()> {
        let dir = TempDir::new().expect("tempdir");
        let present = staged(dir.path(), "a.db");
        let mut gone = staged(dir.path(), "b.db");
        gone.path = dir.path().join("already-gone.db");

        let report = CleanupPolicy::RemoveStagedFiles
            .apply(&[present, gone], &Recorder::default())
            .await?;
        assert_eq!(report.removed, 1);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].0.ends_with("already-gone.db"));
        Ok(())
    }

    #[tokio::test]
    async fn snapshot_policy_clears_by_tag_without_deleting() -> Result<()> {
        let dir = TempDir::new().expect("tempdir");
        let files = vec![staged(dir.path(), "a.db")];
        let tool = Recorder::default();

        let tag = Tag::from("1700000000");
        let report = CleanupPolicy::ClearSnapshot(tag.clone())
            .apply(&files, &tool)
            .await?;
        assert_eq!(report.snapshot_cleared, Some(tag));
        assert_eq!(*tool.cleared.lock().expect("lock"), vec!["1700000000".to_string()]);
        assert!(files[0].path.exists());
        Ok(())
    }

    #[tokio::test]
    async fn failed_snapshot_release_is_an_error() {
        let tool = Recorder {
            fail: true,
            ..Recorder::default()
        };
        let err = CleanupPolicy::ClearSnapshot(Tag::from("1"))
            .apply(&[], &tool)
            .await
            .expect_err("tool failure");
        assert!(matches!(err, BackupError::ExternalTool { .. }));
    }
}
