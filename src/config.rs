//! Daemon configuration: persisted session settings plus process options.
//!
//! [`DaemonConfig`] is built exactly once at process start by layering
//! defaults, the persisted `settings.toml` in the config directory, and
//! command-line overrides (command line wins). After the build it is handed
//! to the lifecycle and never mutated; runtime reconfiguration re-reads the
//! settings file and applies the result to the live session instead.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::logsink::LogLevel;
use crate::{DaemonError, Result};

/// File name of the persisted session settings inside the config directory.
pub const SETTINGS_FILE: &str = "settings.toml";

fn default_true() -> bool {
    true
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_log_level() -> String {
    "info".into()
}

/// Session settings persisted in `settings.toml`.
///
/// Every field is default-tolerant so a partial file parses; an absent file
/// yields pure defaults. Unknown keys are ignored so newer files remain
/// readable by older daemons.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SessionSettings {
    /// Where completed transfers are written.
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    /// Directory observed for new work-descriptor files.
    #[serde(default)]
    pub watch_dir: Option<PathBuf>,
    /// Whether the watch directory is observed at all.
    #[serde(default)]
    pub watch_dir_enabled: bool,
    /// Delete accepted descriptor files instead of renaming them.
    #[serde(default)]
    pub trash_watch_files: bool,
    /// Whether the remote control interface is reachable. Forced on during
    /// reload so an operator can always reach a misconfigured daemon.
    #[serde(default = "default_true")]
    pub control_interface_enabled: bool,
    /// Listening port for peer connections; 0 lets the OS pick.
    #[serde(default)]
    pub peer_port: u16,
    /// Whether peer blocklists are consulted.
    #[serde(default)]
    pub blocklist_enabled: bool,
    /// Minimum severity written to the log sink.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            watch_dir: None,
            watch_dir_enabled: false,
            trash_watch_files: false,
            control_interface_enabled: true,
            peer_port: 0,
            blocklist_enabled: false,
            log_level: default_log_level(),
        }
    }
}

/// Command-line overrides layered on top of the persisted settings.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// Observe this directory for descriptor files.
    pub watch_dir: Option<PathBuf>,
    /// Write completed transfers here.
    pub download_dir: Option<PathBuf>,
    /// Start all transfers paused.
    pub paused: bool,
    /// Stay attached to the terminal.
    pub foreground: bool,
    /// Record the process id here.
    pub pid_file: Option<PathBuf>,
    /// Write session log messages here.
    pub log_file: Option<PathBuf>,
    /// Minimum severity override.
    pub log_level: Option<String>,
}

/// Immutable-after-build daemon configuration.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Merged session settings (defaults ← file ← CLI).
    pub settings: SessionSettings,
    /// Directory holding `settings.toml` and the session store.
    pub config_dir: PathBuf,
    /// Start all transfers paused.
    pub paused: bool,
    /// Foreground mode: logs default to stderr instead of syslog-style.
    pub foreground: bool,
    /// Pidfile path, when configured.
    pub pid_file: Option<PathBuf>,
    /// Session log file path, when configured.
    pub log_file: Option<PathBuf>,
    /// Effective minimum severity at startup.
    pub log_level: LogLevel,
}

impl DaemonConfig {
    /// Layer defaults, persisted settings, and CLI overrides into the final
    /// configuration, creating the config directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::Config`] if the config directory cannot be
    /// created, or [`DaemonError::Settings`] if an existing settings file is
    /// unreadable or invalid TOML. A missing settings file is not an error.
    pub fn build(config_dir: PathBuf, overrides: CliOverrides) -> Result<Self> {
        fs::create_dir_all(&config_dir).map_err(|err| {
            DaemonError::Config(format!(
                "cannot create config dir {}: {err}",
                config_dir.display()
            ))
        })?;

        let mut settings = load_settings(&config_dir)?;

        if let Some(dir) = overrides.watch_dir {
            settings.watch_dir = Some(dir);
            settings.watch_dir_enabled = true;
        }
        if let Some(dir) = overrides.download_dir {
            settings.download_dir = dir;
        }
        if let Some(level) = overrides.log_level {
            settings.log_level = level;
        }

        let log_level = LogLevel::parse(&settings.log_level).unwrap_or_else(|| {
            warn!(level = %settings.log_level, "unrecognized log level, using info");
            LogLevel::Info
        });

        Ok(Self {
            settings,
            config_dir,
            paused: overrides.paused,
            foreground: overrides.foreground,
            pid_file: overrides.pid_file,
            log_file: overrides.log_file,
            log_level,
        })
    }

    /// The configured watch directory, if watching is enabled and the path
    /// is non-empty.
    #[must_use]
    pub fn watch_dir(&self) -> Option<&Path> {
        if !self.settings.watch_dir_enabled {
            return None;
        }
        self.settings
            .watch_dir
            .as_deref()
            .filter(|dir| !dir.as_os_str().is_empty())
    }

    /// Path of the persisted settings file under this config directory.
    #[must_use]
    pub fn settings_path(&self) -> PathBuf {
        settings_path(&self.config_dir)
    }
}

/// Path of `settings.toml` under `config_dir`.
#[must_use]
pub fn settings_path(config_dir: &Path) -> PathBuf {
    config_dir.join(SETTINGS_FILE)
}

/// Read the persisted settings, or defaults when no file exists.
///
/// # Errors
///
/// Returns [`DaemonError::Settings`] if the file exists but cannot be read
/// or parsed.
pub fn load_settings(config_dir: &Path) -> Result<SessionSettings> {
    let path = settings_path(config_dir);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(SessionSettings::default());
        }
        Err(err) => {
            return Err(DaemonError::Settings(format!(
                "cannot read {}: {err}",
                path.display()
            )));
        }
    };
    Ok(toml::from_str(&raw)?)
}

/// Write the effective settings back to the config directory.
///
/// # Errors
///
/// Returns [`DaemonError::Settings`] if serialization or the write fails.
pub fn save_settings(config_dir: &Path, settings: &SessionSettings) -> Result<()> {
    let path = settings_path(config_dir);
    let raw = toml::to_string_pretty(settings)?;
    fs::write(&path, raw)
        .map_err(|err| DaemonError::Settings(format!("cannot write {}: {err}", path.display())))
}
