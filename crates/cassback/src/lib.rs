//! Backup and restore of Cassandra data files to object storage
//!
//! Data files are discovered under the node's data root
//! (`<root>/<keyspace>/<table>/snapshots/<tag>/*` for full snapshots,
//! `<root>/<keyspace>/<table>/backups/*` for incremental backups), gzip
//! compressed one object per file, and stored under a date-partitioned key:
//!
//! ```text
//! YYYY/MM/DD/<keyspace>/<table>/<file>
//! ```
//!
//! A restore lists one day's prefix, optionally narrowed by keyspace, and
//! decompresses every object back under a restore root.
//!
//! # Architecture
//!
//! - **scanner**: walks the keyspace/table/category hierarchy
//! - **transfer**: bounded-memory compress-and-upload / download-and-decompress
//! - **key**: object key derivation and its inverse
//! - **index**: date-prefix listing and keyspace filtering for restores
//! - **cleanup**: post-upload local cleanup or snapshot release
//! - **snapshot**: the external `nodetool` collaborator
//! - **archiver**: sequences the above, one file at a time, failing fast
//!
//! # Usage
//!
//! ```no_run
//! # async fn example() -> cassback::Result<()> {
//! use cassback::{Archiver, BackupConfig};
//!
//! let config = BackupConfig::default();
//! let archiver = Archiver::from_config(config)?;
//! let report = archiver.incremental(None).await?;
//! println!("uploaded {} files", report.uploaded.len());
//! # Ok(())
//! # }
//! ```

pub mod archiver;
pub mod cleanup;
pub mod clock;
pub mod config;
mod error;
pub mod index;
pub mod key;
pub mod layout;
pub mod scanner;
pub mod snapshot;
pub mod storage;
pub mod transfer;

pub use archiver::{Archiver, BackupReport, RestorePlanEntry, RestoreReport};
pub use cleanup::{CleanupPolicy, CleanupReport};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{BackupConfig, NodetoolConfig, StorageConfig, TransferConfig};
pub use error::BackupError;
pub use layout::{BackupFile, Category, Tag};
pub use snapshot::{Nodetool, SnapshotTool};
pub use storage::build_object_store;
pub use transfer::{DownloadSummary, Transfer, UploadSummary};

/// Result type for backup and restore operations
pub type Result<T> = std::result::Result<T, BackupError>;
