//! Configuration passed explicitly to every component
//!
//! A config can be loaded from YAML; every field has a default, so a file only
//! needs the values it changes:
//!
//! ```yaml
//! data_root: /var/lib/cassandra/data
//! storage:
//!   url: s3://my-backups
//!   region: eu-west-1
//! transfer:
//!   part_size: 67108864
//! nodetool:
//!   host: 10.0.0.5
//! ```

use crate::{BackupError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const MIB: usize = 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Root of the keyspace/table hierarchy
    pub data_root: PathBuf,

    /// Directory restored files are written under
    pub restore_root: PathBuf,

    pub storage: StorageConfig,
    pub transfer: TransferConfig,
    pub nodetool: NodetoolConfig,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("/var/lib/cassandra/data"),
            restore_root: PathBuf::from("restore"),
            storage: StorageConfig::default(),
            transfer: TransferConfig::default(),
            nodetool: NodetoolConfig::default(),
        }
    }
}

impl BackupConfig {
    /// Read a YAML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| BackupError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: BackupConfig = serde_yaml_ng::from_str(text)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage.url.trim().is_empty() {
            return Err(BackupError::InvalidConfig(
                "storage url must not be empty".to_string(),
            ));
        }
        self.transfer.validate()
    }
}

/// Where objects are stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `s3://bucket[/prefix]`, a bare bucket name, `file:///path` or `memory://`
    pub url: String,

    pub region: String,

    /// Custom S3 endpoint (MinIO, R2, ...)
    pub endpoint: String,

    /// Empty means: take credentials from the `AWS_*` environment
    pub access_key: String,
    pub secret_key: String,

    /// Permit plain-http endpoints
    pub allow_http: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            url: "s3://cassandra-backups".to_string(),
            region: "us-east-1".to_string(),
            endpoint: String::new(),
            access_key: String::new(),
            secret_key: String::new(),
            allow_http: false,
        }
    }
}

/// Streaming and multipart parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Bytes per multipart part
    pub part_size: usize,

    /// Maximum number of parts in one upload
    pub max_parts: usize,

    /// Buffer size of the pipe between the codec stage and the I/O stage
    pub pipe_capacity: usize,

    /// Read size used by the I/O stage
    pub chunk_size: usize,

    /// Parts allowed to upload concurrently within one file
    pub max_in_flight_parts: usize,

    /// gzip level, 0-9
    pub compression_level: i32,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            part_size: 128 * MIB,
            max_parts: 10_000,
            pipe_capacity: MIB,
            chunk_size: 64 * 1024,
            max_in_flight_parts: 2,
            compression_level: 6,
        }
    }
}

impl TransferConfig {
    pub fn validate(&self) -> Result<()> {
        let sizes = [
            ("part_size", self.part_size),
            ("max_parts", self.max_parts),
            ("pipe_capacity", self.pipe_capacity),
            ("chunk_size", self.chunk_size),
            ("max_in_flight_parts", self.max_in_flight_parts),
        ];
        for (name, value) in sizes {
            if value == 0 {
                return Err(BackupError::InvalidConfig(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        if !(0..=9).contains(&self.compression_level) {
            return Err(BackupError::InvalidConfig(format!(
                "compression_level {} is outside 0-9",
                self.compression_level
            )));
        }
        Ok(())
    }

    /// Largest compressed stream one upload may carry.
    #[must_use]
    pub fn max_upload_bytes(&self) -> u64 {
        (self.part_size as u64).saturating_mul(self.max_parts as u64)
    }
}

/// Connection parameters forwarded to `nodetool`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodetoolConfig {
    pub program: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for NodetoolConfig {
    fn default() -> Self {
        Self {
            program: "nodetool".to_string(),
            host: None,
            port: None,
            username: None,
            password: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_s3_limits() {
        let config = BackupConfig::default();
        assert_eq!(config.transfer.part_size, 128 * MIB);
        assert_eq!(config.transfer.max_parts, 10_000);
        assert_eq!(config.data_root, PathBuf::from("/var/lib/cassandra/data"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_keeps_defaults() -> Result<()> {
        let config = BackupConfig::from_yaml(
            "data_root: /srv/data\nstorage:\n  url: file:///tmp/backups\ntransfer:\n  part_size: 1024\n",
        )?;
        assert_eq!(config.data_root, PathBuf::from("/srv/data"));
        assert_eq!(config.storage.url, "file:///tmp/backups");
        assert_eq!(config.storage.region, "us-east-1");
        assert_eq!(config.transfer.part_size, 1024);
        assert_eq!(config.transfer.max_parts, 10_000);
        assert_eq!(config.nodetool.program, "nodetool");
        Ok(())
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let mut config = BackupConfig::default();
        config.transfer.chunk_size = 0;
        let err = config.validate().expect_err("zero chunk size");
        assert!(err.to_string().contains("chunk_size"));
    }

    #[test]
    fn compression_level_is_bounded() {
        let mut config = BackupConfig::default();
        config.transfer.compression_level = 12;
        assert!(config.validate().is_err());
    }

    #[test]
    fn upload_bound_is_parts_times_size() {
        let transfer = TransferConfig {
            part_size: 10,
            max_parts: 3,
            ..TransferConfig::default()
        };
        assert_eq!(transfer.max_upload_bytes(), 30);
    }
}
