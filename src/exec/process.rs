// src/exec/process.rs

//! Process runner primitives.
//!
//! - [`spawn_merged`] starts a command whose stdout and stderr share one pipe
//!   and exposes that pipe as a stream of decoded lines.
//! - [`run_oneshot`] runs a short command to completion and captures stdout,
//!   for status queries.

use std::os::fd::OwnedFd;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use nix::fcntl::OFlag;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::{Pid, pipe2};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::unix::pipe;
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Whether the child gets its own process group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessGroup {
    /// Stay in our process group (default for job commands).
    Inherit,
    /// Lead a new group, so the whole tree can be signalled at once.
    Own,
}

/// Reads an output stream (by default a merged output pipe) line by line.
///
/// Lines end at `\n`, invalid UTF-8 is replaced with U+FFFD, trailing
/// whitespace is trimmed, and lines that end up empty are skipped.
#[derive(Debug)]
pub struct LineReader<R = pipe::Receiver> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            buf: Vec::with_capacity(256),
        }
    }

    /// Next non-empty line, or `None` at end of stream.
    pub async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        loop {
            self.buf.clear();
            let n = self.reader.read_until(b'\n', &mut self.buf).await?;
            if n == 0 {
                return Ok(None);
            }
            if let Some(line) = decode_line(&self.buf) {
                return Ok(Some(line));
            }
        }
    }
}

/// Decode one raw line. Returns `None` if nothing is left after trimming.
pub fn decode_line(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim_end();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

/// A running child with a single merged output stream.
#[derive(Debug)]
pub struct MergedProcess {
    child: Child,
    lines: Option<LineReader>,
    group: ProcessGroup,
}

impl MergedProcess {
    /// Take the output stream. Only the first call returns `Some`.
    pub fn take_lines(&mut self) -> Option<LineReader> {
        self.lines.take()
    }

    /// Wait for the child to exit and return its exit code.
    ///
    /// A child killed by a signal reports `-1`.
    pub async fn wait(&mut self) -> Result<i32> {
        let status = self
            .child
            .wait()
            .await
            .context("waiting for process to exit")?;
        Ok(status.code().unwrap_or(-1))
    }

    /// Ask the child to stop: SIGTERM, wait up to `grace`, then SIGKILL.
    ///
    /// Children spawned with [`ProcessGroup::Own`] are signalled as a whole
    /// group.
    pub async fn terminate(&mut self, grace: Duration) -> Result<()> {
        let Some(pid) = self.child.id() else {
            // Already reaped.
            return Ok(());
        };

        self.signal(pid, Signal::SIGTERM);
        match timeout(grace, self.child.wait()).await {
            Ok(status) => {
                let status = status.context("waiting for process after SIGTERM")?;
                debug!(pid, ?status, "process exited after SIGTERM");
            }
            Err(_) => {
                warn!(pid, grace_ms = grace.as_millis() as u64, "process ignored SIGTERM; killing");
                self.signal(pid, Signal::SIGKILL);
                self.child
                    .wait()
                    .await
                    .context("waiting for process after SIGKILL")?;
            }
        }
        Ok(())
    }

    fn signal(&self, pid: u32, signal: Signal) {
        let result = match self.group {
            ProcessGroup::Own => killpg(Pid::from_raw(pid as i32), signal),
            ProcessGroup::Inherit => nix::sys::signal::kill(Pid::from_raw(pid as i32), signal),
        };
        match result {
            Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
            Err(err) => warn!(pid, ?signal, error = %err, "failed to signal process"),
        }
    }
}

impl Drop for MergedProcess {
    /// `kill_on_drop` only reaches the direct child; a group leader's
    /// descendants are killed here. No-op once the child has been reaped.
    fn drop(&mut self) {
        if self.group != ProcessGroup::Own {
            return;
        }
        if let Some(pid) = self.child.id() {
            debug!(pid, "killing process group of dropped process");
            self.signal(pid, Signal::SIGKILL);
        }
    }
}

/// Spawn `argv` with stdout and stderr merged into one pipe.
pub fn spawn_merged(argv: &[String], group: ProcessGroup) -> Result<MergedProcess> {
    let Some((program, args)) = argv.split_first() else {
        bail!("cannot spawn an empty command");
    };

    let (read_end, write_end) = merged_pipe()?;
    let stderr_end = write_end
        .try_clone()
        .context("duplicating output pipe for stderr")?;

    // The command is dropped at the end of this block, closing our copies of
    // the write end; otherwise the reader would never see EOF.
    let child = {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(write_end))
            .stderr(Stdio::from(stderr_end))
            .kill_on_drop(true);
        if group == ProcessGroup::Own {
            cmd.process_group(0);
        }
        cmd.spawn()
            .with_context(|| format!("spawning '{}'", argv.join(" ")))?
    };

    let receiver = pipe::Receiver::from_owned_fd(read_end)
        .context("registering output pipe with the runtime")?;

    debug!(pid = child.id(), program = %program, "process spawned");

    Ok(MergedProcess {
        child,
        lines: Some(LineReader::new(receiver)),
        group,
    })
}

fn merged_pipe() -> Result<(OwnedFd, OwnedFd)> {
    // Close-on-exec so concurrently spawned children never inherit another
    // job's write end.
    pipe2(OFlag::O_CLOEXEC).context("creating output pipe")
}

/// Captured result of a short command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub exit_code: i32,
}

/// Run `argv` to completion and capture its stdout (stderr is discarded).
///
/// A non-zero exit code is not an error; only failure to run the command is.
pub async fn run_oneshot(argv: &[String]) -> Result<CommandOutput> {
    let Some((program, args)) = argv.split_first() else {
        bail!("cannot run an empty command");
    };

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("running '{}'", argv.join(" ")))?;

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        exit_code: output.status.code().unwrap_or(-1),
    })
}
