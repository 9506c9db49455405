use anyhow::{Context, Result};
use cassback::{Archiver, BackupConfig, BackupReport};

/// Run a full snapshot backup, or an incremental one.
pub async fn backup_command(
    config: BackupConfig,
    incremental: bool,
    keyspace: Option<&str>,
) -> Result<BackupReport> {
    let archiver = Archiver::from_config(config)?;
    let report = if incremental {
        archiver
            .incremental(keyspace)
            .await
            .context("Incremental backup failed")?
    } else {
        archiver
            .full_snapshot(keyspace)
            .await
            .context("Snapshot backup failed")?
    };
    Ok(report)
}

/// One-line summary printed on success.
#[must_use]
pub fn summarize(report: &BackupReport) -> String {
    let files = report.uploaded.len();
    let read: u64 = report.uploaded.iter().map(|u| u.bytes_read).sum();
    let stored: u64 = report.uploaded.iter().map(|u| u.bytes_uploaded).sum();
    let mut line = match &report.tag {
        Some(tag) => format!("Snapshot {tag}: uploaded {files} files ({read} bytes, {stored} compressed)"),
        None => format!("Incremental: uploaded {files} files ({read} bytes, {stored} compressed)"),
    };
    if !report.cleanup.is_complete() {
        line.push_str(&format!(
            "; {} staged files could not be removed",
            report.cleanup.failed.len()
        ));
    }
    line
}
