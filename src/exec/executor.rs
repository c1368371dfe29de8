// src/exec/executor.rs

//! Job executor: drives one command from spawn to completion, or until it
//! hands its work to a detached service unit.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use tokio::io::AsyncRead;
use tracing::{debug, error, info};

use crate::jobs::{JobStatus, JobWriter};

use super::context::ExecutionContext;
use super::monitor::supervise_unit;
use super::process::{LineReader, ProcessGroup, spawn_merged};

static DETACHED_UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Running as unit:\s*([^\s;]+)").expect("detached unit pattern is valid")
});

/// Extract the unit name from a `Running as unit: <name>` line.
pub fn detached_unit_in(line: &str) -> Option<&str> {
    DETACHED_UNIT
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// How the spawned process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ProcessEnd {
    exit_code: i32,
    detached_unit: Option<String>,
}

/// Run `argv` as the job owned by `writer`.
///
/// Never returns an error: every failure ends up as job state (a synthetic
/// log line, `Failed`, exit code -1).
pub async fn run_job(mut writer: JobWriter, argv: Vec<String>, ctx: ExecutionContext) {
    let job_id = writer.job_id();
    writer.mark_running();
    info!(%job_id, cmd = %argv.join(" "), "starting job process");

    match drive_process(&mut writer, &argv).await {
        Ok(ProcessEnd {
            exit_code: 0,
            detached_unit: Some(unit),
        }) => {
            info!(%job_id, %unit, "process handed off to detached unit");
            supervise_unit(writer, unit, ctx).await;
        }
        Ok(end) => {
            info!(
                %job_id,
                exit_code = end.exit_code,
                success = end.exit_code == 0,
                "job process exited"
            );
            writer.finish(JobStatus::from_exit_code(end.exit_code), end.exit_code);
        }
        Err(err) => fail_with_internal_error(writer, &err),
    }
}

/// Report an execution failure as job state: one synthetic line, then
/// `Failed` with exit code -1.
fn fail_with_internal_error(mut writer: JobWriter, err: &anyhow::Error) {
    error!(job_id = %writer.job_id(), error = %format!("{err:#}"), "job execution error");
    writer.append(format!("Internal Error: {err:#}"));
    writer.finish(JobStatus::Failed, -1);
}

async fn drive_process(writer: &mut JobWriter, argv: &[String]) -> Result<ProcessEnd> {
    let mut process = spawn_merged(argv, ProcessGroup::Inherit)?;
    let mut lines = process
        .take_lines()
        .context("process output stream unavailable")?;

    let detached_unit = pump_output(writer, &mut lines).await?;
    let exit_code = process.wait().await?;
    Ok(ProcessEnd {
        exit_code,
        detached_unit,
    })
}

/// Append every line of `lines` to the job and return the last detached
/// unit announced, if any. Lines read before a failure stay in the log.
async fn pump_output<R: AsyncRead + Unpin>(
    writer: &mut JobWriter,
    lines: &mut LineReader<R>,
) -> Result<Option<String>> {
    let mut detached_unit = None;
    while let Some(line) = lines
        .next_line()
        .await
        .context("reading process output")?
    {
        if let Some(unit) = detached_unit_in(&line) {
            debug!(job_id = %writer.job_id(), unit, "detachment marker seen");
            detached_unit = Some(unit.to_string());
        }
        writer.append(line);
    }
    Ok(detached_unit)
}
