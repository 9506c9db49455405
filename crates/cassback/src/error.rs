//! Error types for backup and restore operations

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    /// The data root, a keyspace directory or a snapshot tag directory
    /// could not be read. Always fatal.
    #[error("Cannot read directory {}: {source}", .path.display())]
    Configuration {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Cannot read config file {}: {source}", .path.display())]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse config file: {0}")]
    ConfigParse(#[from] serde_yaml_ng::Error),

    #[error("External command `{command}` failed ({status}): {stderr}")]
    ExternalTool {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Transfer of {item} failed: {source}")]
    Transfer {
        item: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Object store error on {item}: {source}")]
    Store {
        item: String,
        #[source]
        source: object_store::Error,
    },

    #[error(
        "Compressed size of {key} exceeds {max_parts} parts of {part_size} bytes"
    )]
    PartLimitExceeded {
        key: String,
        part_size: usize,
        max_parts: usize,
    },

    #[error("Invalid object key: {0}")]
    InvalidObjectKey(String),

    #[error("Snapshot tag {0} is already in use")]
    TagCollision(String),
}

impl BackupError {
    pub(crate) fn transfer(item: impl std::fmt::Display, source: std::io::Error) -> Self {
        BackupError::Transfer {
            item: item.to_string(),
            source,
        }
    }

    pub(crate) fn store(item: impl std::fmt::Display, source: object_store::Error) -> Self {
        BackupError::Store {
            item: item.to_string(),
            source,
        }
    }
}
