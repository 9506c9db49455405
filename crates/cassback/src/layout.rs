//! On-disk layout of the data root and the files discovered in it
//!
//! ```text
//! <data-root>/<keyspace>/<table>/snapshots/<tag>/<file>
//! <data-root>/<keyspace>/<table>/backups/<file>
//! ```

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;

/// Per-table directory holding one subdirectory per snapshot tag.
pub const SNAPSHOTS_DIR: &str = "snapshots";

/// Per-table directory where the engine stages incremental backup files.
pub const BACKUPS_DIR: &str = "backups";

/// Identifier of one full snapshot: the Unix time in seconds at creation.
///
/// Used both as the on-disk directory name under `snapshots/` and as the
/// `-t` argument to the snapshot tool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag(String);

impl Tag {
    #[must_use]
    pub fn from_time(now: DateTime<Utc>) -> Self {
        Tag(now.timestamp().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Tag {
    fn from(value: &str) -> Self {
        Tag(value.to_string())
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which kind of staged data a file belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Category {
    Snapshot(Tag),
    Backup,
}

impl Category {
    #[must_use]
    pub fn is_snapshot(&self) -> bool {
        matches!(self, Category::Snapshot(_))
    }
}

/// One file found by the scanner, with the hierarchy position it was found at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFile {
    /// Full local path
    pub path: PathBuf,
    pub keyspace: String,
    pub table: String,
    pub file_name: String,
    pub category: Category,
}

impl BackupFile {
    /// `keyspace/table/file_name`, the part of the object key after the date.
    #[must_use]
    pub fn relative_key(&self) -> String {
        format!("{}/{}/{}", self.keyspace, self.table, self.file_name)
    }
}
