//! Object store construction from [`StorageConfig`]

use crate::config::StorageConfig;
use crate::{BackupError, Result};
use diagnostics::*;
use object_store::ObjectStore;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::prefix::PrefixStore;
use std::sync::Arc;

/// Parsed form of `StorageConfig::url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageTarget {
    S3 { bucket: String, prefix: String },
    Local(String),
    Memory,
}

impl StorageTarget {
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        if let Some(rest) = url.strip_prefix("s3://") {
            let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
            if bucket.is_empty() {
                return Err(BackupError::InvalidConfig(format!("no bucket in {url}")));
            }
            return Ok(StorageTarget::S3 {
                bucket: bucket.to_string(),
                prefix: prefix.trim_matches('/').to_string(),
            });
        }
        if let Some(path) = url.strip_prefix("file://") {
            if path.is_empty() {
                return Err(BackupError::InvalidConfig(format!("no path in {url}")));
            }
            return Ok(StorageTarget::Local(path.to_string()));
        }
        if url == "memory://" {
            return Ok(StorageTarget::Memory);
        }
        if url.is_empty() || url.contains("://") || url.contains('/') {
            return Err(BackupError::InvalidConfig(format!(
                "unsupported storage url {url}"
            )));
        }
        // A bare name is a bucket
        Ok(StorageTarget::S3 {
            bucket: url.to_string(),
            prefix: String::new(),
        })
    }
}

/// Build the store objects are written to and read from.
pub fn build_object_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    match StorageTarget::parse(&config.url)? {
        StorageTarget::S3 { bucket, prefix } => {
            log_debug!("Using S3 bucket {bucket} in {region}", bucket: bucket.as_str(), region: config.region.as_str());

            let mut builder = AmazonS3Builder::from_env()
                .with_bucket_name(&bucket)
                .with_region(&config.region)
                .with_allow_http(config.allow_http);

            if !config.access_key.is_empty() {
                builder = builder.with_access_key_id(&config.access_key);
            }
            if !config.secret_key.is_empty() {
                builder = builder.with_secret_access_key(&config.secret_key);
            }
            if !config.endpoint.is_empty() {
                builder = builder.with_endpoint(&config.endpoint);
            }

            let store = builder.build().map_err(|e| {
                BackupError::InvalidConfig(format!("Failed to build S3 store: {e}"))
            })?;

            if prefix.is_empty() {
                Ok(Arc::new(store))
            } else {
                Ok(Arc::new(PrefixStore::new(store, prefix.as_str())))
            }
        }
        StorageTarget::Local(path) => {
            std::fs::create_dir_all(&path).map_err(|source| BackupError::Configuration {
                path: path.clone().into(),
                source,
            })?;
            let store = LocalFileSystem::new_with_prefix(&path).map_err(|e| {
                BackupError::InvalidConfig(format!("Failed to build local store: {e}"))
            })?;
            Ok(Arc::new(store))
        }
        StorageTarget::Memory => Ok(Arc::new(InMemory::new())),
    }
}
