// src/exec/supervisor.rs

//! Service-manager query surface used by the detached unit monitor.
//!
//! The monitor talks to a [`UnitSupervisor`] instead of calling `systemctl`
//! directly, so tests can script unit states without a real service manager.
//! [`SystemdSupervisor`] is the production implementation.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use tracing::warn;

use super::process::run_oneshot;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Runtime state of a unit as reported by the service manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitState {
    Active,
    Activating,
    Deactivating,
    Reloading,
    Inactive,
    Failed,
    Other(String),
}

impl UnitState {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "active" => UnitState::Active,
            "activating" => UnitState::Activating,
            "deactivating" => UnitState::Deactivating,
            "reloading" => UnitState::Reloading,
            "inactive" => UnitState::Inactive,
            "failed" => UnitState::Failed,
            "" => UnitState::Other("unknown".to_string()),
            other => UnitState::Other(other.to_string()),
        }
    }

    /// `inactive` and `failed` end the monitor's poll loop.
    pub fn is_settled(&self) -> bool {
        matches!(self, UnitState::Inactive | UnitState::Failed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            UnitState::Active => "active",
            UnitState::Activating => "activating",
            UnitState::Deactivating => "deactivating",
            UnitState::Reloading => "reloading",
            UnitState::Inactive => "inactive",
            UnitState::Failed => "failed",
            UnitState::Other(s) => s,
        }
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The service manager's textual verdict for a finished unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeDescriptor {
    Success,
    /// The manager reported no usable verdict.
    Unknown,
    /// The outcome query itself failed.
    Error,
    /// Any other verdict (`exit-code`, `signal`, `timeout`, ...).
    Other(String),
}

impl OutcomeDescriptor {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "" | "unknown" => OutcomeDescriptor::Unknown,
            "success" => OutcomeDescriptor::Success,
            "error" => OutcomeDescriptor::Error,
            other => OutcomeDescriptor::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            OutcomeDescriptor::Success => "success",
            OutcomeDescriptor::Unknown => "unknown",
            OutcomeDescriptor::Error => "error",
            OutcomeDescriptor::Other(s) => s,
        }
    }
}

impl fmt::Display for OutcomeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution result code plus outcome descriptor of a finished unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOutcome {
    pub exec_status: i32,
    pub result: OutcomeDescriptor,
}

impl UnitOutcome {
    pub fn new(exec_status: i32, result: OutcomeDescriptor) -> Self {
        Self {
            exec_status,
            result,
        }
    }

    /// What a failed or unparseable outcome query resolves to.
    pub fn query_failed() -> Self {
        Self::new(-1, OutcomeDescriptor::Error)
    }

    /// Parse `systemctl show -p ExecMainStatus -p Result` output.
    ///
    /// A missing or non-numeric `ExecMainStatus` makes the whole query count
    /// as failed. A missing or empty `Result` is `unknown`.
    pub fn parse_show_output(output: &str) -> Self {
        let mut exec_status = None;
        let mut result = OutcomeDescriptor::Unknown;

        for line in output.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            match key.trim() {
                "ExecMainStatus" => exec_status = value.trim().parse::<i32>().ok(),
                "Result" => result = OutcomeDescriptor::parse(value),
                _ => {}
            }
        }

        match exec_status {
            Some(code) => Self::new(code, result),
            None => Self::query_failed(),
        }
    }
}

/// Queries a service manager about one named unit.
pub trait UnitSupervisor: Send + Sync + fmt::Debug {
    /// Current runtime state. Query failures map to an `Other` state so the
    /// caller keeps polling.
    fn active_state<'a>(&'a self, unit: &'a str) -> BoxFuture<'a, UnitState>;

    /// Execution result code and outcome descriptor. Query failures map to
    /// [`UnitOutcome::query_failed`].
    fn unit_outcome<'a>(&'a self, unit: &'a str) -> BoxFuture<'a, UnitOutcome>;

    /// Command that follows the unit's log from now on, without backfill.
    fn tail_command(&self, unit: &str) -> Vec<String>;
}

/// `systemctl` / `journalctl` backed supervisor.
#[derive(Debug, Clone)]
pub struct SystemdSupervisor {
    systemctl: String,
    journalctl: String,
}

impl SystemdSupervisor {
    pub fn new(systemctl: impl Into<String>, journalctl: impl Into<String>) -> Self {
        Self {
            systemctl: systemctl.into(),
            journalctl: journalctl.into(),
        }
    }

    fn systemctl_argv(&self, args: &[&str]) -> Vec<String> {
        std::iter::once(self.systemctl.clone())
            .chain(args.iter().map(|a| a.to_string()))
            .collect()
    }
}

impl Default for SystemdSupervisor {
    fn default() -> Self {
        Self::new("systemctl", "journalctl")
    }
}

impl UnitSupervisor for SystemdSupervisor {
    fn active_state<'a>(&'a self, unit: &'a str) -> BoxFuture<'a, UnitState> {
        Box::pin(async move {
            // `is-active` exits non-zero for inactive/failed units; only the
            // printed word matters.
            match run_oneshot(&self.systemctl_argv(&["is-active", unit])).await {
                Ok(out) => UnitState::parse(out.stdout.lines().next().unwrap_or("")),
                Err(err) => {
                    warn!(unit, error = %format!("{err:#}"), "unit state query failed");
                    UnitState::Other("unknown".to_string())
                }
            }
        })
    }

    fn unit_outcome<'a>(&'a self, unit: &'a str) -> BoxFuture<'a, UnitOutcome> {
        Box::pin(async move {
            let argv = self.systemctl_argv(&["show", unit, "-p", "ExecMainStatus", "-p", "Result"]);
            match run_oneshot(&argv).await {
                Ok(out) if out.exit_code == 0 => UnitOutcome::parse_show_output(&out.stdout),
                Ok(out) => {
                    warn!(unit, exit_code = out.exit_code, "unit outcome query exited non-zero");
                    UnitOutcome::query_failed()
                }
                Err(err) => {
                    warn!(unit, error = %format!("{err:#}"), "unit outcome query failed");
                    UnitOutcome::query_failed()
                }
            }
        })
    }

    fn tail_command(&self, unit: &str) -> Vec<String> {
        vec![
            self.journalctl.clone(),
            "-u".to_string(),
            unit.to_string(),
            "-f".to_string(),
            "-n".to_string(),
            "0".to_string(),
            "-o".to_string(),
            "cat".to_string(),
        ]
    }
}
