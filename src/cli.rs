// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `jobctl`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "jobctl",
    version,
    about = "Run administrative commands as jobs and follow their output to completion.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `/etc/jobctl/jobctl.toml` if it exists, built-in defaults
    /// otherwise.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `JOBCTL_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: JobCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum JobCommand {
    /// Run an arbitrary command as a job.
    Run {
        #[command(flatten)]
        output: OutputArgs,

        /// Command and arguments.
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        argv: Vec<String>,
    },

    /// Run the system upgrade script.
    Upgrade {
        #[command(flatten)]
        output: OutputArgs,

        /// Ask the script for a dry run.
        #[arg(long)]
        dry_run: bool,
    },

    /// Enable or disable the Samba share.
    Samba {
        #[command(flatten)]
        output: OutputArgs,

        #[arg(value_enum)]
        action: SambaAction,
    },
}

impl JobCommand {
    pub fn output(&self) -> &OutputArgs {
        match self {
            JobCommand::Run { output, .. }
            | JobCommand::Upgrade { output, .. }
            | JobCommand::Samba { output, .. } => output,
        }
    }
}

#[derive(Debug, Clone, Default, clap::Args)]
pub struct OutputArgs {
    /// Print the final job status as JSON instead of a summary line.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum SambaAction {
    Enable,
    Disable,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_keeps_hyphenated_args() {
        let args = CliArgs::try_parse_from(["jobctl", "run", "--", "ls", "-la", "/tmp"]).unwrap();
        match args.command {
            JobCommand::Run { argv, output } => {
                assert_eq!(argv, vec!["ls", "-la", "/tmp"]);
                assert!(!output.json);
            }
            other => panic!("expected run, got {other:?}"),
        }
    }

    #[test]
    fn test_upgrade_flags() {
        let args = CliArgs::try_parse_from([
            "jobctl",
            "--log-level",
            "debug",
            "upgrade",
            "--dry-run",
            "--json",
        ])
        .unwrap();
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
        match args.command {
            JobCommand::Upgrade { dry_run, output } => {
                assert!(dry_run);
                assert!(output.json);
            }
            other => panic!("expected upgrade, got {other:?}"),
        }
    }

    #[test]
    fn test_samba_action() {
        let args = CliArgs::try_parse_from(["jobctl", "samba", "disable"]).unwrap();
        assert!(matches!(
            args.command,
            JobCommand::Samba { action: SambaAction::Disable, .. }
        ));
        assert!(CliArgs::try_parse_from(["jobctl", "samba", "toggle"]).is_err());
    }

    #[test]
    fn test_run_requires_command() {
        assert!(CliArgs::try_parse_from(["jobctl", "run"]).is_err());
    }
}
