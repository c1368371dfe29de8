// src/config/model.rs

use serde::Deserialize;

use crate::exec::MonitorSettings;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [monitor]
/// poll_interval = "2s"
/// stop_grace = "5s"
/// completion_marker = "System upgrade completed successfully."
///
/// [supervisor]
/// systemctl = "systemctl"
/// journalctl = "journalctl"
///
/// [commands]
/// sudo = true
/// upgrade_script = "/usr/local/bin/system-upgrade.sh"
/// samba_script = "/usr/local/bin/manage-samba.sh"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub monitor: RawMonitorSection,

    #[serde(default)]
    pub supervisor: SupervisorSection,

    #[serde(default)]
    pub commands: CommandsSection,
}

/// `[monitor]` section. Durations are strings like `"2s"` or `"500ms"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawMonitorSection {
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,

    #[serde(default = "default_stop_grace")]
    pub stop_grace: String,

    /// Log text that marks a successful upgrade when the service manager
    /// cannot report an outcome.
    #[serde(default = "default_completion_marker")]
    pub completion_marker: String,
}

fn default_poll_interval() -> String {
    "2s".to_string()
}

fn default_stop_grace() -> String {
    "5s".to_string()
}

fn default_completion_marker() -> String {
    crate::exec::context::DEFAULT_COMPLETION_MARKER.to_string()
}

impl Default for RawMonitorSection {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            stop_grace: default_stop_grace(),
            completion_marker: default_completion_marker(),
        }
    }
}

/// `[supervisor]` section: service manager binaries.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SupervisorSection {
    #[serde(default = "default_systemctl")]
    pub systemctl: String,

    #[serde(default = "default_journalctl")]
    pub journalctl: String,
}

fn default_systemctl() -> String {
    "systemctl".to_string()
}

fn default_journalctl() -> String {
    "journalctl".to_string()
}

impl Default for SupervisorSection {
    fn default() -> Self {
        Self {
            systemctl: default_systemctl(),
            journalctl: default_journalctl(),
        }
    }
}

/// `[commands]` section: the scripts behind the preset subcommands.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandsSection {
    /// Prefix preset commands with `sudo -n`.
    #[serde(default = "default_sudo")]
    pub sudo: bool,

    #[serde(default = "default_upgrade_script")]
    pub upgrade_script: String,

    #[serde(default = "default_samba_script")]
    pub samba_script: String,
}

fn default_sudo() -> bool {
    true
}

fn default_upgrade_script() -> String {
    "/usr/local/bin/system-upgrade.sh".to_string()
}

fn default_samba_script() -> String {
    "/usr/local/bin/manage-samba.sh".to_string()
}

impl Default for CommandsSection {
    fn default() -> Self {
        Self {
            sudo: default_sudo(),
            upgrade_script: default_upgrade_script(),
            samba_script: default_samba_script(),
        }
    }
}

impl CommandsSection {
    fn privileged(&self, script: &str, args: &[&str]) -> Vec<String> {
        let mut argv = Vec::with_capacity(args.len() + 3);
        if self.sudo {
            argv.push("sudo".to_string());
            argv.push("-n".to_string());
        }
        argv.push(script.to_string());
        argv.extend(args.iter().map(|a| a.to_string()));
        argv
    }

    /// `[sudo -n] <upgrade_script> [--dry-run]`
    pub fn upgrade_argv(&self, dry_run: bool) -> Vec<String> {
        let args: &[&str] = if dry_run { &["--dry-run"] } else { &[] };
        self.privileged(&self.upgrade_script, args)
    }

    /// `[sudo -n] <samba_script> enable|disable`
    pub fn samba_argv(&self, enable: bool) -> Vec<String> {
        let action = if enable { "enable" } else { "disable" };
        self.privileged(&self.samba_script, &[action])
    }
}

/// Validated configuration.
///
/// Obtain one through `ConfigFile::try_from(RawConfigFile)` (see
/// `validate.rs`) or [`ConfigFile::default`].
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub monitor: MonitorSettings,
    pub supervisor: SupervisorSection,
    pub commands: CommandsSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        monitor: MonitorSettings,
        supervisor: SupervisorSection,
        commands: CommandsSection,
    ) -> Self {
        Self {
            monitor,
            supervisor,
            commands,
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(
            MonitorSettings::default(),
            SupervisorSection::default(),
            CommandsSection::default(),
        )
    }
}
