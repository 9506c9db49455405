use std::process::ExitCode;

use clap::{Parser, Subcommand};
use cmd::commands::{backup, backup_command, restore::RestoreOutcome, restore_command};
use cmd::common::{GlobalArgs, load_config};
use diagnostics::*;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "cassback")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a fresh snapshot, or the staged incremental backup files
    Backup {
        /// Upload incremental backup files instead of taking a snapshot
        #[arg(long)]
        incremental: bool,

        /// Only this keyspace
        #[arg(short, long)]
        keyspace: Option<String>,
    },
    /// Download and decompress one day's backup objects
    Restore {
        /// Restore the day this many days before today
        #[arg(short, long, default_value_t = 0)]
        days: u32,

        /// Only keys whose keyspace starts with this prefix
        #[arg(short, long)]
        keyspace: Option<String>,

        /// List what would be restored without downloading
        #[arg(long)]
        dry_run: bool,
    },
}

#[allow(clippy::print_stdout)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli.global)?;

    match cli.command {
        Commands::Backup {
            incremental,
            keyspace,
        } => {
            let report = backup_command(config, incremental, keyspace.as_deref()).await?;
            println!("{}", backup::summarize(&report));
        }
        Commands::Restore {
            days,
            keyspace,
            dry_run,
        } => match restore_command(config, days, keyspace.as_deref(), dry_run).await? {
            RestoreOutcome::Planned(lines) => {
                for line in &lines {
                    println!("{line}");
                }
                println!("{} objects would be restored", lines.len());
            }
            RestoreOutcome::Restored { date, files, bytes } => {
                println!("Restored {files} files ({bytes} bytes) from {date}");
            }
        },
    }
    Ok(())
}

#[tokio::main]
#[allow(clippy::print_stderr)]
async fn main() -> ExitCode {
    init_diagnostics();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let message = format!("{e:#}");
            log_error!("{message}", message: message.as_str());
            eprintln!("Error: {message}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::try_parse_from([
            "cassback",
            "restore",
            "--days",
            "2",
            "--keyspace",
            "ks1",
            "--bucket",
            "laptop-db",
            "--dry-run",
        ])
        .expect("parse");
        assert_eq!(cli.global.bucket.as_deref(), Some("laptop-db"));
        match cli.command {
            Commands::Restore {
                days,
                keyspace,
                dry_run,
            } => {
                assert_eq!(days, 2);
                assert_eq!(keyspace.as_deref(), Some("ks1"));
                assert!(dry_run);
            }
            Commands::Backup { .. } => panic!("parsed as backup"),
        }
    }

    #[test]
    fn backup_defaults_to_snapshot() {
        let cli = Cli::try_parse_from(["cassback", "backup"]).expect("parse");
        assert!(matches!(
            cli.command,
            Commands::Backup {
                incremental: false,
                keyspace: None
            }
        ));
    }
}
