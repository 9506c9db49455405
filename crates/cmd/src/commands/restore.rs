use anyhow::{Context, Result};
use cassback::{Archiver, BackupConfig};

pub enum RestoreOutcome {
    Restored { date: String, files: usize, bytes: u64 },
    Planned(Vec<String>),
}

/// Restore one day's objects, or only list what would be restored.
pub async fn restore_command(
    config: BackupConfig,
    days: u32,
    keyspace: Option<&str>,
    dry_run: bool,
) -> Result<RestoreOutcome> {
    let archiver = Archiver::from_config(config)?;

    if dry_run {
        let plan = archiver
            .plan_restore(days, keyspace)
            .await
            .context("Failed to list objects to restore")?;
        let lines = plan
            .into_iter()
            .map(|entry| format!("{} -> {}", entry.key, entry.path.display()))
            .collect();
        return Ok(RestoreOutcome::Planned(lines));
    }

    let report = archiver
        .restore(days, keyspace)
        .await
        .context("Restore failed")?;
    Ok(RestoreOutcome::Restored {
        date: report.date.format("%Y-%m-%d").to_string(),
        files: report.restored.len(),
        bytes: report.restored.iter().map(|d| d.bytes_written).sum(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn local_config(dir: &TempDir) -> BackupConfig {
        let mut config = BackupConfig::default();
        config.storage.url = format!("file://{}", dir.path().join("objects").display());
        config.restore_root = dir.path().join("restore");
        config
    }

    #[tokio::test]
    async fn empty_store_restores_nothing() -> Result<()> {
        let dir = TempDir::new()?;
        match restore_command(local_config(&dir), 0, None, false).await? {
            RestoreOutcome::Restored { files, bytes, .. } => {
                assert_eq!(files, 0);
                assert_eq!(bytes, 0);
            }
            RestoreOutcome::Planned(_) => panic!("not a dry run"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn dry_run_writes_nothing() -> Result<()> {
        let dir = TempDir::new()?;
        let config = local_config(&dir);
        let restore_root = config.restore_root.clone();
        match restore_command(config, 0, Some("ks1"), true).await? {
            RestoreOutcome::Planned(lines) => assert!(lines.is_empty()),
            RestoreOutcome::Restored { .. } => panic!("dry run restored"),
        }
        assert!(fs::metadata(restore_root).is_err());
        Ok(())
    }
}
