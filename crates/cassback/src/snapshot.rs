//! The external snapshot tool
//!
//! Snapshots are created and released by the storage engine's own tooling
//! (`nodetool`), never by touching snapshot directories directly. Both calls
//! run the tool as a child process without a shell; a non-zero exit is fatal
//! and carries the tool's stderr.

use crate::config::NodetoolConfig;
use crate::layout::Tag;
use crate::{BackupError, Result};
use async_trait::async_trait;
use diagnostics::*;
use tokio::process::Command;

#[async_trait]
pub trait SnapshotTool: Send + Sync {
    /// Take snapshot `tag` of `keyspace`, or of every keyspace.
    async fn snapshot(&self, tag: &Tag, keyspace: Option<&str>) -> Result<()>;

    /// Release the hard links held by snapshot `tag`.
    async fn clear_snapshot(&self, tag: &Tag) -> Result<()>;
}

/// `nodetool` invoked with the configured connection options.
#[derive(Debug, Clone)]
pub struct Nodetool {
    config: NodetoolConfig,
}

impl Nodetool {
    #[must_use]
    pub fn new(config: NodetoolConfig) -> Self {
        Self { config }
    }

    fn connection_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(host) = &self.config.host {
            args.extend(["-h".to_string(), host.clone()]);
        }
        if let Some(port) = self.config.port {
            args.extend(["-p".to_string(), port.to_string()]);
        }
        if let Some(username) = &self.config.username {
            args.extend(["-u".to_string(), username.clone()]);
        }
        if let Some(password) = &self.config.password {
            args.extend(["-pw".to_string(), password.clone()]);
        }
        args
    }

    /// Full argument list for `snapshot -t <tag> [keyspace]`.
    #[must_use]
    pub fn snapshot_args(&self, tag: &Tag, keyspace: Option<&str>) -> Vec<String> {
        let mut args = self.connection_args();
        args.extend(["snapshot".to_string(), "-t".to_string(), tag.to_string()]);
        if let Some(keyspace) = keyspace.filter(|k| !k.is_empty()) {
            args.push(keyspace.to_string());
        }
        args
    }

    /// Full argument list for `clearsnapshot -t <tag>`.
    #[must_use]
    pub fn clear_snapshot_args(&self, tag: &Tag) -> Vec<String> {
        let mut args = self.connection_args();
        args.extend(["clearsnapshot".to_string(), "-t".to_string(), tag.to_string()]);
        args
    }

    /// Command line for messages, with the password masked.
    fn describe(&self, args: &[String]) -> String {
        let mut shown = vec![self.config.program.clone()];
        let mut mask_next = false;
        for arg in args {
            if mask_next {
                shown.push("****".to_string());
                mask_next = false;
            } else {
                mask_next = arg == "-pw";
                shown.push(arg.clone());
            }
        }
        shown.join(" ")
    }

    async fn run(&self, args: Vec<String>) -> Result<()> {
        let command = self.describe(&args);
        log_info!("Running {command}", command: command.as_str());

        let output = Command::new(&self.config.program)
            .args(&args)
            .output()
            .await
            .map_err(|e| BackupError::ExternalTool {
                command: command.clone(),
                status: "not started".to_string(),
                stderr: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            log_info!("{command}: {stdout}", command: command.as_str(), stdout: stdout.trim());
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            log_error!("{command} failed: {stderr}", command: command.as_str(), stderr: stderr.as_str());
            return Err(BackupError::ExternalTool {
                command,
                status: output.status.to_string(),
                stderr,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SnapshotTool for Nodetool {
    async fn snapshot(&self, tag: &Tag, keyspace: Option<&str>) -> Result<()> {
        self.run(self.snapshot_args(tag, keyspace)).await
    }

    async fn clear_snapshot(&self, tag: &Tag) -> Result<()> {
        self.run(self.clear_snapshot_args(tag)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_connection() -> Nodetool {
        Nodetool::new(NodetoolConfig {
            program: "nodetool".to_string(),
            host: Some("10.0.0.5".to_string()),
            port: Some(7199),
            username: Some("cassandra".to_string()),
            password: Some("secret".to_string()),
        })
    }

    #[test]
    fn snapshot_args_without_connection() {
        let tool = Nodetool::new(NodetoolConfig::default());
        let tag = Tag::from("1700000000");
        assert_eq!(tool.snapshot_args(&tag, None), ["snapshot", "-t", "1700000000"]);
        assert_eq!(
            tool.snapshot_args(&tag, Some("ks1")),
            ["snapshot", "-t", "1700000000", "ks1"]
        );
        assert_eq!(tool.snapshot_args(&tag, Some("")), ["snapshot", "-t", "1700000000"]);
        assert_eq!(tool.clear_snapshot_args(&tag), ["clearsnapshot", "-t", "1700000000"]);
    }

    #[test]
    fn connection_options_precede_subcommand() {
        let tool = with_connection();
        let args = tool.clear_snapshot_args(&Tag::from("7"));
        assert_eq!(
            args,
            [
                "-h", "10.0.0.5", "-p", "7199", "-u", "cassandra", "-pw", "secret",
                "clearsnapshot", "-t", "7"
            ]
        );
    }

    #[test]
    fn password_is_masked_in_descriptions() {
        let tool = with_connection();
        let shown = tool.describe(&tool.snapshot_args(&Tag::from("7"), None));
        assert!(!shown.contains("secret"));
        assert!(shown.contains("-pw ****"));
        assert!(shown.starts_with("nodetool -h 10.0.0.5"));
    }

    #[tokio::test]
    async fn missing_program_is_an_external_tool_error() {
        let tool = Nodetool::new(NodetoolConfig {
            program: "/nonexistent/nodetool".to_string(),
            ..NodetoolConfig::default()
        });
        let err = tool
            .snapshot(&Tag::from("1"), None)
            .await
            .expect_err("program missing");
        assert!(matches!(err, BackupError::ExternalTool { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_carries_stderr() {
        // `false` ignores its arguments and exits 1
        let tool = Nodetool::new(NodetoolConfig {
            program: "false".to_string(),
            ..NodetoolConfig::default()
        });
        let err = tool
            .clear_snapshot(&Tag::from("1"))
            .await
            .expect_err("false exits non-zero");
        match err {
            BackupError::ExternalTool { command, .. } => {
                assert_eq!(command, "false clearsnapshot -t 1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
