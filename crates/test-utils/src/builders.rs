#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use jobctl::exec::{ExecutionContext, MonitorSettings, UnitSupervisor};

use crate::fake_supervisor::FakeSupervisor;

/// Builder for `ExecutionContext` with test-friendly timings.
pub struct ContextBuilder {
    supervisor: Arc<dyn UnitSupervisor>,
    monitor: MonitorSettings,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self {
            supervisor: Arc::new(FakeSupervisor::succeeding()),
            monitor: MonitorSettings {
                poll_interval: Duration::from_millis(50),
                stop_grace: Duration::from_millis(500),
                ..MonitorSettings::default()
            },
        }
    }

    pub fn supervisor(mut self, supervisor: impl UnitSupervisor + 'static) -> Self {
        self.supervisor = Arc::new(supervisor);
        self
    }

    pub fn poll_interval(mut self, dur: Duration) -> Self {
        self.monitor.poll_interval = dur;
        self
    }

    pub fn stop_grace(mut self, dur: Duration) -> Self {
        self.monitor.stop_grace = dur;
        self
    }

    pub fn completion_marker(mut self, marker: &str) -> Self {
        self.monitor.completion_marker = marker.to_string();
        self
    }

    pub fn build(self) -> ExecutionContext {
        ExecutionContext::new(self.supervisor, self.monitor)
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
