//! Discovery of files eligible for transfer
//!
//! The data root is read as a three-level hierarchy: keyspace, table, then a
//! per-table category directory (`snapshots/<tag>` or `backups`).
//!
//! Failure to read the data root, a keyspace directory or the requested tag
//! directory is fatal. A table without a `snapshots`/`backups` directory (or
//! one that cannot be read) simply has nothing to back up yet.

use crate::layout::{BACKUPS_DIR, BackupFile, Category, SNAPSHOTS_DIR, Tag};
use crate::{BackupError, Result};
use diagnostics::*;
use std::path::{Path, PathBuf};

struct DirEntry {
    name: String,
    path: PathBuf,
}

impl DirEntry {
    fn is_dir(&self) -> bool {
        self.path.is_dir()
    }
}

/// Entries of `dir`, ordered by name.
fn list_dir(dir: &Path) -> std::io::Result<Vec<DirEntry>> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        entries.push(DirEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: entry.path(),
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

fn list_required(dir: &Path) -> Result<Vec<DirEntry>> {
    list_dir(dir).map_err(|source| BackupError::Configuration {
        path: dir.to_path_buf(),
        source,
    })
}

fn list_optional(dir: &Path) -> Option<Vec<DirEntry>> {
    match list_dir(dir) {
        Ok(entries) => Some(entries),
        Err(e) => {
            let dir_str = dir.display().to_string();
            let err_str = e.to_string();
            log_debug!("Skipping {dir}: {reason}", dir: dir_str, reason: err_str);
            None
        }
    }
}

struct TableDir {
    keyspace: String,
    table: String,
    path: PathBuf,
}

/// Every keyspace/table directory pair, optionally restricted to one keyspace.
fn tables(data_root: &Path, keyspace: Option<&str>) -> Result<Vec<TableDir>> {
    let keyspace = keyspace.filter(|k| !k.is_empty());
    let mut tables = Vec::new();

    for ks in list_required(data_root)? {
        if !ks.is_dir() {
            continue;
        }
        if keyspace.is_some_and(|wanted| wanted != ks.name) {
            continue;
        }
        for table in list_required(&ks.path)? {
            if !table.is_dir() {
                continue;
            }
            tables.push(TableDir {
                keyspace: ks.name.clone(),
                table: table.name,
                path: table.path,
            });
        }
    }
    Ok(tables)
}

fn collect_files(
    dir: &[DirEntry],
    table: &TableDir,
    category: &Category,
    out: &mut Vec<BackupFile>,
) {
    for entry in dir.iter().filter(|e| !e.is_dir()) {
        out.push(BackupFile {
            path: entry.path.clone(),
            keyspace: table.keyspace.clone(),
            table: table.table.clone(),
            file_name: entry.name.clone(),
            category: category.clone(),
        });
    }
}

/// Files of snapshot `tag`, across all keyspaces.
///
/// Only `snapshots/<tag>` directories contribute; other tags are ignored.
pub fn scan_snapshot(data_root: &Path, tag: &Tag) -> Result<Vec<BackupFile>> {
    let category = Category::Snapshot(tag.clone());
    let mut files = Vec::new();

    for table in tables(data_root, None)? {
        let Some(snapshots) = list_optional(&table.path.join(SNAPSHOTS_DIR)) else {
            continue;
        };
        for snapshot in snapshots {
            if snapshot.name != tag.as_str() {
                continue;
            }
            let entries = list_required(&snapshot.path)?;
            collect_files(&entries, &table, &category, &mut files);
        }
    }

    let count = files.len() as u64;
    log_info!("Found {count} files for snapshot {tag}", count: count, tag: tag.as_str());
    Ok(files)
}

/// Files staged in every table's `backups` directory.
///
/// `keyspace` restricts the scan to the keyspace of exactly that name.
pub fn scan_backups(data_root: &Path, keyspace: Option<&str>) -> Result<Vec<BackupFile>> {
    let mut files = Vec::new();

    for table in tables(data_root, keyspace)? {
        let Some(entries) = list_optional(&table.path.join(BACKUPS_DIR)) else {
            continue;
        };
        collect_files(&entries, &table, &Category::Backup, &mut files);
    }

    let count = files.len() as u64;
    log_info!("Found {count} incremental backup files", count: count);
    Ok(files)
}

/// Whether any table already holds a `snapshots/<tag>` directory.
pub fn tag_in_use(data_root: &Path, tag: &Tag) -> Result<bool> {
    for table in tables(data_root, None)? {
        if table.path.join(SNAPSHOTS_DIR).join(tag.as_str()).exists() {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().expect("has parent")).expect("mkdir");
        fs::write(path, content).expect("write");
    }

    fn names(files: &[BackupFile]) -> Vec<String> {
        let mut names: Vec<String> = files.iter().map(BackupFile::relative_key).collect();
        names.sort();
        names
    }

    #[test]
    fn backups_union_across_keyspaces_and_tables() -> Result<()> {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path();
        for ks in ["ks1", "ks2"] {
            for tbl in ["t1", "t2"] {
                touch(root, &format!("{ks}/{tbl}/backups/{tbl}-a.db"), b"a");
                touch(root, &format!("{ks}/{tbl}/backups/{tbl}-b.db"), b"b");
            }
        }
        // Table with no backups directory at all
        fs::create_dir_all(root.join("ks2/t3")).expect("mkdir");
        // Live sstables next to backups/ are not candidates
        touch(root, "ks1/t1/nb-9-big-Data.db", b"live");

        let files = scan_backups(root, None)?;
        assert_eq!(files.len(), 8);
        assert!(files.iter().all(|f| f.category == Category::Backup));
        assert!(!names(&files).contains(&"ks1/t1/nb-9-big-Data.db".to_string()));
        Ok(())
    }

    #[test]
    fn backups_keyspace_filter_is_exact() -> Result<()> {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path();
        touch(root, "ks1/t/backups/one.db", b"1");
        touch(root, "ks10/t/backups/ten.db", b"10");

        let files = scan_backups(root, Some("ks1"))?;
        assert_eq!(names(&files), vec!["ks1/t/one.db".to_string()]);

        let all = scan_backups(root, Some(""))?;
        assert_eq!(all.len(), 2);
        Ok(())
    }

    #[test]
    fn snapshot_scan_only_reads_requested_tag() -> Result<()> {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path();
        touch(root, "ks1/tbl1/snapshots/1700000000/nb-1-big-Data.db", b"ABC");
        touch(root, "ks1/tbl2/snapshots/1600000000/nb-1-big-Data.db", b"old");
        touch(root, "ks2/tbl1/snapshots/1700000000/manifest.json", b"{}");
        fs::create_dir_all(root.join("ks2/tbl2")).expect("mkdir");

        let tag = Tag::from("1700000000");
        let files = scan_snapshot(root, &tag)?;
        assert_eq!(
            names(&files),
            vec![
                "ks1/tbl1/nb-1-big-Data.db".to_string(),
                "ks2/tbl1/manifest.json".to_string()
            ]
        );
        assert!(files.iter().all(|f| f.category == Category::Snapshot(tag.clone())));

        let first = files
            .iter()
            .find(|f| f.keyspace == "ks1")
            .expect("ks1 file");
        assert_eq!(
            first.path,
            root.join("ks1/tbl1/snapshots/1700000000/nb-1-big-Data.db")
        );
        Ok(())
    }

    #[test]
    fn snapshot_scan_skips_nested_directories() -> Result<()> {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path();
        touch(root, "ks/t/snapshots/42/file.db", b"x");
        touch(root, "ks/t/snapshots/42/.idx/index.db", b"y");

        let files = scan_snapshot(root, &Tag::from("42"))?;
        assert_eq!(names(&files), vec!["ks/t/file.db".to_string()]);
        Ok(())
    }

    #[test]
    fn missing_data_root_is_fatal() {
        let dir = TempDir::new().expect("tempdir");
        let missing = dir.path().join("nope");
        let err = scan_backups(&missing, None).expect_err("missing root");
        assert!(matches!(err, BackupError::Configuration { .. }));
        let err = scan_snapshot(&missing, &Tag::from("1")).expect_err("missing root");
        assert!(matches!(err, BackupError::Configuration { .. }));
    }

    #[test]
    fn stray_files_at_keyspace_level_are_ignored() -> Result<()> {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path();
        touch(root, "README", b"not a keyspace");
        touch(root, "ks/t/backups/a.db", b"a");
        assert_eq!(scan_backups(root, None)?.len(), 1);
        Ok(())
    }

    #[test]
    fn output_is_ordered_by_name() -> Result<()> {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path();
        for name in ["c.db", "a.db", "b.db"] {
            touch(root, &format!("ks/t/backups/{name}"), b"x");
        }
        let files = scan_backups(root, None)?;
        let order: Vec<&str> = files.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(order, vec!["a.db", "b.db", "c.db"]);
        Ok(())
    }

    #[test]
    fn tag_in_use_detects_existing_directory() -> Result<()> {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path();
        fs::create_dir_all(root.join("ks/t/snapshots/100")).expect("mkdir");
        assert!(tag_in_use(root, &Tag::from("100"))?);
        assert!(!tag_in_use(root, &Tag::from("101"))?);
        Ok(())
    }
}
