// src/exec/monitor.rs

//! Detached unit monitor.
//!
//! Takes over a job once its process has registered a long-running unit with
//! the service manager and exited cleanly. The monitor follows the unit's log,
//! polls its state until it settles, stops the log follower, and only then
//! decides the job's verdict.
//!
//! Ordering rule: the follower is terminated and fully drained before the job
//! is finalized, so no line can be appended after the terminal sentinel.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use crate::jobs::{JobStatus, JobWriter};

use super::context::ExecutionContext;
use super::process::{MergedProcess, ProcessGroup, spawn_merged};
use super::supervisor::{OutcomeDescriptor, UnitOutcome, UnitState};

/// Final status and exit code for a detached job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub status: JobStatus,
    pub exit_code: i32,
}

/// Whether any log line contains the script's completion marker.
///
/// This couples the verdict to the invoked script's wording; it is only
/// consulted when the service manager reports no outcome at all.
pub fn logs_report_completion(logs: &[String], marker: &str) -> bool {
    !marker.is_empty() && logs.iter().any(|line| line.contains(marker))
}

/// Combine the settled unit state, the unit's outcome and the job log.
///
/// 1. Success iff the unit is `inactive`, its result is `success` and its
///    exec status is 0.
/// 2. Otherwise, if the result is `unknown` and the log contains the
///    completion marker, success with exit code 0.
/// 3. Otherwise failure with the unit's exec status (-1 if the query failed).
pub fn decide_verdict(
    state: &UnitState,
    outcome: &UnitOutcome,
    logs: &[String],
    completion_marker: &str,
) -> Verdict {
    let clean_exit = *state == UnitState::Inactive
        && outcome.result == OutcomeDescriptor::Success
        && outcome.exec_status == 0;
    if clean_exit {
        return Verdict {
            status: JobStatus::Success,
            exit_code: 0,
        };
    }

    if outcome.result == OutcomeDescriptor::Unknown
        && logs_report_completion(logs, completion_marker)
    {
        return Verdict {
            status: JobStatus::Success,
            exit_code: 0,
        };
    }

    Verdict {
        status: JobStatus::Failed,
        exit_code: outcome.exec_status,
    }
}

/// Log follower: the tailing process plus the task forwarding its lines.
struct LogFollower {
    process: MergedProcess,
    forwarder: JoinHandle<()>,
}

fn follow_unit_log(
    argv: &[String],
    tx: mpsc::UnboundedSender<String>,
) -> anyhow::Result<LogFollower> {
    let mut process = spawn_merged(argv, ProcessGroup::Own)?;
    let mut lines = process
        .take_lines()
        .ok_or_else(|| anyhow::anyhow!("log follower output stream unavailable"))?;

    let forwarder = tokio::spawn(async move {
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    warn!(error = %err, "error reading unit log");
                    break;
                }
            }
        }
    });

    Ok(LogFollower { process, forwarder })
}

/// Supervise `unit` to completion and finalize the job owned by `writer`.
pub async fn supervise_unit(mut writer: JobWriter, unit: String, ctx: ExecutionContext) {
    let job_id = writer.job_id();
    let settings = &ctx.monitor;
    writer.append(format!("Monitoring detached unit {unit}..."));
    info!(%job_id, %unit, "monitoring detached unit");

    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
    let tail_argv = ctx.supervisor.tail_command(&unit);
    let mut follower = match follow_unit_log(&tail_argv, line_tx) {
        Ok(follower) => Some(follower),
        Err(err) => {
            warn!(%job_id, %unit, error = %format!("{err:#}"), "cannot follow unit log");
            writer.append(format!("Unable to follow logs of {unit}: {err:#}"));
            None
        }
    };

    let mut ticker = interval_at(Instant::now() + settings.poll_interval, settings.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut tail_open = follower.is_some();
    let final_state = loop {
        tokio::select! {
            line = line_rx.recv(), if tail_open => match line {
                Some(line) => writer.append(line),
                None => tail_open = false,
            },
            _ = ticker.tick() => {
                let state = ctx.supervisor.active_state(&unit).await;
                debug!(%job_id, %unit, %state, "polled unit state");
                if state.is_settled() {
                    break state;
                }
            }
        }
    };
    info!(%job_id, %unit, state = %final_state, "detached unit settled");

    if let Some(LogFollower {
        mut process,
        forwarder,
    }) = follower.take()
    {
        if let Err(err) = process.terminate(settings.stop_grace).await {
            warn!(%job_id, %unit, error = %format!("{err:#}"), "failed to stop log follower");
        }
        if let Err(err) = forwarder.await {
            warn!(%job_id, %unit, error = %err, "log follower task failed");
        }
    }
    // The forwarder has finished and dropped its sender; whatever is left in
    // the channel is the tail of the log.
    while let Some(line) = line_rx.recv().await {
        writer.append(line);
    }

    let outcome = ctx.supervisor.unit_outcome(&unit).await;
    let logs = writer.record().logs();
    let verdict = decide_verdict(&final_state, &outcome, &logs, &settings.completion_marker);
    info!(
        %job_id,
        %unit,
        exec_status = outcome.exec_status,
        result = %outcome.result,
        status = %verdict.status,
        exit_code = verdict.exit_code,
        "detached unit finished"
    );

    writer.finish(verdict.status, verdict.exit_code);
}
