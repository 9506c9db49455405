//! Backup and restore runs
//!
//! Every run is sequential and fail-fast: files are transferred one at a
//! time, and the first failure aborts the remainder of the batch without
//! running cleanup. Cleanup only ever sees a batch that uploaded completely.

use crate::cleanup::{CleanupPolicy, CleanupReport};
use crate::clock::{Clock, SystemClock};
use crate::config::BackupConfig;
use crate::index::{list_restore_keys, restore_date};
use crate::key::{restore_path, upload_key};
use crate::layout::{BackupFile, Tag};
use crate::scanner::{scan_backups, scan_snapshot, tag_in_use};
use crate::snapshot::{Nodetool, SnapshotTool};
use crate::storage::build_object_store;
use crate::transfer::{DownloadSummary, Transfer, UploadSummary};
use crate::{BackupError, Result};
use chrono::NaiveDate;
use diagnostics::*;
use object_store::ObjectStore;
use object_store::path::Path as ObjectPath;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Attempts at a fresh snapshot tag before giving up.
const TAG_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Default)]
pub struct BackupReport {
    /// Snapshot tag for full runs
    pub tag: Option<Tag>,
    pub uploaded: Vec<UploadSummary>,
    pub cleanup: CleanupReport,
}

#[derive(Debug, Clone)]
pub struct RestoreReport {
    pub date: NaiveDate,
    pub restored: Vec<DownloadSummary>,
}

/// One object a restore would fetch and where it would land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestorePlanEntry {
    /// Key as listed, passed back to the store unchanged
    pub key: ObjectPath,
    pub path: PathBuf,
}

pub struct Archiver {
    config: BackupConfig,
    transfer: Transfer,
    tool: Arc<dyn SnapshotTool>,
    clock: Arc<dyn Clock>,
    tag_retry_delay: Duration,
}

impl Archiver {
    pub fn new(
        config: BackupConfig,
        store: Arc<dyn ObjectStore>,
        tool: Arc<dyn SnapshotTool>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let transfer = Transfer::new(store, config.transfer.clone());
        Self {
            config,
            transfer,
            tool,
            clock,
            tag_retry_delay: Duration::from_secs(1),
        }
    }

    /// Validate `config` and wire up the configured store, `nodetool` and the
    /// system clock.
    pub fn from_config(config: BackupConfig) -> Result<Self> {
        config.validate()?;
        let store = build_object_store(&config.storage)?;
        let tool = Arc::new(Nodetool::new(config.nodetool.clone()));
        Ok(Self::new(config, store, tool, Arc::new(SystemClock)))
    }

    /// Pause between attempts when a snapshot tag is already taken.
    #[must_use]
    pub fn with_tag_retry_delay(mut self, delay: Duration) -> Self {
        self.tag_retry_delay = delay;
        self
    }

    #[must_use]
    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    /// Snapshot `keyspace` (or everything), upload the snapshot files and
    /// release the snapshot.
    pub async fn full_snapshot(&self, keyspace: Option<&str>) -> Result<BackupReport> {
        let tag = self.fresh_tag().await?;
        log_info!("Taking snapshot {tag}", tag: tag.as_str());

        self.tool.snapshot(&tag, keyspace).await?;
        let files = scan_snapshot(&self.config.data_root, &tag)?;
        let uploaded = self.upload_all(&files).await?;

        let cleanup = CleanupPolicy::ClearSnapshot(tag.clone())
            .apply(&files, self.tool.as_ref())
            .await?;

        Ok(BackupReport {
            tag: Some(tag),
            uploaded,
            cleanup,
        })
    }

    /// Upload the staged incremental files and remove them locally.
    pub async fn incremental(&self, keyspace: Option<&str>) -> Result<BackupReport> {
        let files = scan_backups(&self.config.data_root, keyspace)?;
        let uploaded = self.upload_all(&files).await?;

        let cleanup = CleanupPolicy::RemoveStagedFiles
            .apply(&files, self.tool.as_ref())
            .await?;
        if !cleanup.is_complete() {
            let failed = cleanup.failed.len() as u64;
            log_warn!("{failed} staged files were left in place", failed: failed);
        }

        Ok(BackupReport {
            tag: None,
            uploaded,
            cleanup,
        })
    }

    /// Restore every object stored `days` days ago under `restore_root`.
    pub async fn restore(&self, days: u32, keyspace: Option<&str>) -> Result<RestoreReport> {
        let (date, plan) = self.plan(days, keyspace).await?;

        let mut restored = Vec::with_capacity(plan.len());
        for entry in plan {
            let summary = self
                .transfer
                .download_object(&entry.key, &entry.path)
                .await
                .inspect_err(|e| {
                    let reason = e.to_string();
                    log_error!("Restore aborted at {key}: {reason}", key: entry.key.as_ref(), reason: reason.as_str());
                })?;
            restored.push(summary);
        }

        let count = restored.len() as u64;
        log_info!("Restored {count} files", count: count);
        Ok(RestoreReport { date, restored })
    }

    /// The objects `restore` would fetch, without fetching them.
    pub async fn plan_restore(
        &self,
        days: u32,
        keyspace: Option<&str>,
    ) -> Result<Vec<RestorePlanEntry>> {
        Ok(self.plan(days, keyspace).await?.1)
    }

    async fn plan(
        &self,
        days: u32,
        keyspace: Option<&str>,
    ) -> Result<(NaiveDate, Vec<RestorePlanEntry>)> {
        let date = restore_date(self.clock.now(), days)?;
        let keys = list_restore_keys(self.transfer.store().as_ref(), date, keyspace).await?;

        let plan = keys
            .into_iter()
            .map(|key| {
                let path = restore_path(&self.config.restore_root, &key)?;
                Ok(RestorePlanEntry { key, path })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((date, plan))
    }

    async fn upload_all(&self, files: &[BackupFile]) -> Result<Vec<UploadSummary>> {
        let total = files.len() as u64;
        log_info!("Uploading {total} files", total: total);

        let mut uploaded = Vec::with_capacity(files.len());
        for file in files {
            let key = upload_key(self.clock.now().date_naive(), file);
            let summary = self
                .transfer
                .upload_file(&file.path, &key)
                .await
                .inspect_err(|e| {
                    let reason = e.to_string();
                    let done = uploaded.len() as u64;
                    log_error!(
                        "Batch aborted at {key} after {done} of {total} files: {reason}",
                        key: key.as_ref(),
                        done: done,
                        total: total,
                        reason: reason.as_str()
                    );
                })?;
            uploaded.push(summary);
        }
        Ok(uploaded)
    }

    async fn fresh_tag(&self) -> Result<Tag> {
        for attempt in 1..=TAG_ATTEMPTS {
            let tag = Tag::from_time(self.clock.now());
            if !tag_in_use(&self.config.data_root, &tag)? {
                return Ok(tag);
            }
            log_warn!("Snapshot tag {tag} already in use (attempt {attempt})", tag: tag.as_str(), attempt: attempt);
            if attempt < TAG_ATTEMPTS {
                tokio::time::sleep(self.tag_retry_delay).await;
            }
        }
        Err(BackupError::TagCollision(
            Tag::from_time(self.clock.now()).to_string(),
        ))
    }
}
