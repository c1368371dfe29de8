// src/exec/context.rs

//! Settings and collaborators shared by every job driver.

use std::sync::Arc;
use std::time::Duration;

use crate::config::ConfigFile;

use super::supervisor::{SystemdSupervisor, UnitSupervisor};

/// Marker the upgrade script prints when it has finished successfully.
pub const DEFAULT_COMPLETION_MARKER: &str = "System upgrade completed successfully.";

/// Timing and heuristics for the detached unit monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Delay between unit state queries.
    pub poll_interval: Duration,
    /// How long the log tailer gets between SIGTERM and SIGKILL.
    pub stop_grace: Duration,
    /// Log text that counts as success when the supervisor cannot say.
    pub completion_marker: String,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            stop_grace: Duration::from_secs(5),
            completion_marker: DEFAULT_COMPLETION_MARKER.to_string(),
        }
    }
}

/// Everything an executor needs besides the job itself.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub supervisor: Arc<dyn UnitSupervisor>,
    pub monitor: MonitorSettings,
}

impl ExecutionContext {
    pub fn new(supervisor: Arc<dyn UnitSupervisor>, monitor: MonitorSettings) -> Self {
        Self {
            supervisor,
            monitor,
        }
    }

    /// Production context: systemd tools and timings from the config file.
    pub fn from_config(cfg: &ConfigFile) -> Self {
        let supervisor = SystemdSupervisor::new(
            cfg.supervisor.systemctl.clone(),
            cfg.supervisor.journalctl.clone(),
        );
        Self::new(Arc::new(supervisor), cfg.monitor.clone())
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(Arc::new(SystemdSupervisor::default()), MonitorSettings::default())
    }
}
