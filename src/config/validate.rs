// src/config/validate.rs

use std::time::Duration;

use crate::config::duration::parse_duration;
use crate::config::model::{ConfigFile, RawConfigFile, RawMonitorSection};
use crate::errors::{JobctlError, Result};
use crate::exec::MonitorSettings;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = JobctlError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let monitor = validate_monitor(&raw.monitor)?;
        validate_supervisor(&raw)?;
        validate_commands(&raw)?;
        Ok(ConfigFile::new_unchecked(monitor, raw.supervisor, raw.commands))
    }
}

fn validate_monitor(section: &RawMonitorSection) -> Result<MonitorSettings> {
    let poll_interval = non_zero_duration("monitor.poll_interval", &section.poll_interval)?;
    let stop_grace = non_zero_duration("monitor.stop_grace", &section.stop_grace)?;

    if section.completion_marker.trim().is_empty() {
        return Err(JobctlError::ConfigError(
            "monitor.completion_marker must not be empty".to_string(),
        ));
    }

    Ok(MonitorSettings {
        poll_interval,
        stop_grace,
        completion_marker: section.completion_marker.clone(),
    })
}

fn non_zero_duration(key: &str, value: &str) -> Result<Duration> {
    let dur = parse_duration(value)
        .map_err(|e| JobctlError::ConfigError(format!("{key}: {e}")))?;
    if dur.is_zero() {
        return Err(JobctlError::ConfigError(format!(
            "{key} must be greater than zero (got '{value}')"
        )));
    }
    Ok(dur)
}

fn validate_supervisor(cfg: &RawConfigFile) -> Result<()> {
    for (key, value) in [
        ("supervisor.systemctl", &cfg.supervisor.systemctl),
        ("supervisor.journalctl", &cfg.supervisor.journalctl),
    ] {
        require_non_empty(key, value)?;
    }
    Ok(())
}

fn validate_commands(cfg: &RawConfigFile) -> Result<()> {
    for (key, value) in [
        ("commands.upgrade_script", &cfg.commands.upgrade_script),
        ("commands.samba_script", &cfg.commands.samba_script),
    ] {
        require_non_empty(key, value)?;
    }
    Ok(())
}

fn require_non_empty(key: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(JobctlError::ConfigError(format!("{key} must not be empty")));
    }
    Ok(())
}
