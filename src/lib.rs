// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod jobs;
pub mod logging;

use std::io::Write;

use tracing::{info, warn};

use crate::cli::{CliArgs, JobCommand, SambaAction};
use crate::config::ConfigFile;
use crate::errors::Result;
use crate::exec::ExecutionContext;
use crate::jobs::{JobRegistry, JobSnapshot, JobStatus, LogEvent};

/// Exit code used when following is interrupted with Ctrl-C.
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the job registry with a systemd-backed execution context
/// - one job for the requested subcommand
/// - following its output to stdout until it finishes (or Ctrl-C)
///
/// Returns the process exit code: 0 if the job succeeded, 1 otherwise.
pub async fn run(args: CliArgs) -> Result<i32> {
    let cfg = config::resolve(args.config.as_deref())?;
    let argv = job_argv(&args.command, &cfg);
    let json = args.command.output().json;

    let registry = JobRegistry::new(ExecutionContext::from_config(&cfg));
    let job_id = registry.create_job(argv);
    info!(%job_id, "following job output");

    tokio::select! {
        res = follow_job(&registry, job_id) => {
            let snapshot = res?;
            print_summary(&snapshot, json)?;
            Ok(exit_code_for(&snapshot))
        }
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!(error = %e, "failed to listen for Ctrl+C");
            }
            warn!(%job_id, "interrupted; detached units keep running");
            // Stops the job process and any log follower; a detached unit is
            // owned by the service manager and keeps running.
            registry.shutdown().await;
            Ok(INTERRUPTED_EXIT_CODE)
        }
    }
}

/// Translate a subcommand into the argument vector of its job.
pub fn job_argv(command: &JobCommand, cfg: &ConfigFile) -> Vec<String> {
    match command {
        JobCommand::Run { argv, .. } => argv.clone(),
        JobCommand::Upgrade { dry_run, .. } => cfg.commands.upgrade_argv(*dry_run),
        JobCommand::Samba { action, .. } => cfg
            .commands
            .samba_argv(matches!(action, SambaAction::Enable)),
    }
}

/// Print the job's log (history, then live lines) to stdout and return the
/// final snapshot once the stream ends.
async fn follow_job(registry: &JobRegistry, job_id: jobs::JobId) -> Result<JobSnapshot> {
    let mut subscription = registry.subscribe(job_id)?;
    {
        let mut stdout = std::io::stdout().lock();
        for line in subscription.take_history() {
            writeln!(stdout, "{line}")?;
        }
        stdout.flush()?;
    }

    while let Some(event) = subscription.recv().await {
        match event {
            LogEvent::Line(line) => {
                let mut stdout = std::io::stdout().lock();
                writeln!(stdout, "{line}")?;
                stdout.flush()?;
            }
            LogEvent::End => break,
        }
    }
    subscription.unsubscribe();

    registry.wait(job_id).await
}

fn print_summary(snapshot: &JobSnapshot, json: bool) -> Result<()> {
    if json {
        let rendered = serde_json::to_string_pretty(snapshot).map_err(anyhow::Error::from)?;
        println!("{rendered}");
        return Ok(());
    }

    let exit = snapshot
        .exit_code
        .map_or_else(|| "-".to_string(), |c| c.to_string());
    let elapsed = snapshot
        .finished_at
        .map(|end| (end - snapshot.started_at).num_milliseconds() as f64 / 1000.0)
        .unwrap_or_default();
    eprintln!(
        "job {} {} (exit code {}, {:.1}s): {}",
        snapshot.job_id, snapshot.status, exit, elapsed, snapshot.command
    );
    Ok(())
}

fn exit_code_for(snapshot: &JobSnapshot) -> i32 {
    if snapshot.status == JobStatus::Success { 0 } else { 1 }
}
