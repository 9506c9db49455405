use std::path::PathBuf;

use anyhow::{Context, Result};
use cassback::BackupConfig;
use clap::Args;

/// Options shared by every subcommand; each overrides the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// YAML configuration file
    #[arg(long, global = true, env = "CASSBACK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Cassandra data directory (`<keyspace>/<table>/...`)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Directory restored files are written under
    #[arg(long, global = true)]
    pub restore_dir: Option<PathBuf>,

    /// Bucket name, or a full storage URL (s3://, file://, memory://)
    #[arg(long, global = true)]
    pub bucket: Option<String>,

    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Custom S3 endpoint, e.g. a MinIO server
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Multipart upload part size in MiB
    #[arg(long, global = true)]
    pub part_size_mb: Option<usize>,

    /// Maximum parts per upload
    #[arg(long, global = true)]
    pub max_parts: Option<usize>,

    /// Path to the nodetool executable
    #[arg(long, global = true)]
    pub nodetool: Option<String>,

    /// nodetool JMX host
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// nodetool JMX port
    #[arg(long, global = true)]
    pub port: Option<u16>,

    #[arg(long, global = true)]
    pub username: Option<String>,

    #[arg(long, global = true, env = "CASSBACK_NODETOOL_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

/// Storage URL for a `--bucket` value.
fn storage_url(bucket: &str) -> String {
    if bucket.contains("://") {
        bucket.to_string()
    } else {
        format!("s3://{bucket}")
    }
}

/// Load the config file (if any), apply flag overrides and validate.
pub fn load_config(args: &GlobalArgs) -> Result<BackupConfig> {
    let mut config = match &args.config {
        Some(path) => BackupConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => BackupConfig::default(),
    };

    if let Some(dir) = &args.data_dir {
        config.data_root = dir.clone();
    }
    if let Some(dir) = &args.restore_dir {
        config.restore_root = dir.clone();
    }
    if let Some(bucket) = &args.bucket {
        config.storage.url = storage_url(bucket);
    }
    if let Some(region) = &args.region {
        config.storage.region = region.clone();
    }
    if let Some(endpoint) = &args.endpoint {
        config.storage.endpoint = endpoint.clone();
    }
    if let Some(mb) = args.part_size_mb {
        config.transfer.part_size = mb
            .checked_mul(1024 * 1024)
            .context("--part-size-mb is too large")?;
    }
    if let Some(parts) = args.max_parts {
        config.transfer.max_parts = parts;
    }
    if let Some(program) = &args.nodetool {
        config.nodetool.program = program.clone();
    }
    if args.host.is_some() {
        config.nodetool.host = args.host.clone();
    }
    if args.port.is_some() {
        config.nodetool.port = args.port;
    }
    if args.username.is_some() {
        config.nodetool.username = args.username.clone();
    }
    if args.password.is_some() {
        config.nodetool.password = args.password.clone();
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}
