//! The transfer-session seam and the built-in local session.
//!
//! [`ShareSession`] is the interface the daemon drives; a real peer-wire
//! engine plugs in here. [`LocalSession`] is the minimal in-process
//! implementation shipped with the daemon: it reserves the peer port, keeps
//! an in-memory descriptor registry backed by a per-config-dir store, and
//! feeds the session log queue. It is deliberately small — the transfer
//! protocol itself is out of scope for the process controller.

use std::collections::BTreeMap;
use std::fs;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{DaemonConfig, SessionSettings};
use crate::logsink::{LogLevel, LogMessage, LogQueue};
use crate::{DaemonError, Result};

/// Subdirectory of the config dir holding the session's own work-item store.
pub const STORE_DIR: &str = "store";

/// Recognized URI schemes for `.link` descriptor files.
const LINK_SCHEMES: [&str; 2] = ["share:?", "magnet:?"];

/// A work item parsed from a watch-directory entry and handed to the
/// session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Descriptor {
    /// Display name, unique within a session.
    pub name: String,
    /// Content source: an URI or an inline payload reference.
    pub source: String,
    /// Per-descriptor override of the config-wide delete-on-accept option.
    #[serde(default)]
    pub delete_source: Option<bool>,
}

impl Descriptor {
    /// Parse a full `.share` descriptor file.
    ///
    /// Parsing fails closed: a file still being written (truncated TOML,
    /// missing required keys) is an error, never a garbage descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::Session`] when the file cannot be read or does
    /// not hold a complete descriptor.
    pub fn from_share_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| DaemonError::Session(format!("cannot read descriptor: {err}")))?;
        let descriptor: Self = toml::from_str(&raw)
            .map_err(|err| DaemonError::Session(format!("incomplete descriptor: {err}")))?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Parse a single-line `.link` file holding a share URI.
    ///
    /// The name is taken from the file stem; the URI must carry a recognized
    /// scheme or the entry is treated as not-yet-complete.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::Session`] when the file cannot be read, is
    /// empty, or the URI scheme is not recognized.
    pub fn from_link_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| DaemonError::Session(format!("cannot read link: {err}")))?;
        let uri = raw.trim();
        if uri.is_empty() {
            return Err(DaemonError::Session("empty link file".into()));
        }
        if !LINK_SCHEMES.iter().any(|scheme| uri.starts_with(scheme)) {
            return Err(DaemonError::Session(format!(
                "unrecognized link scheme in {}",
                path.display()
            )));
        }
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
            .to_owned();
        let descriptor = Self {
            name,
            source: uri.to_owned(),
            delete_source: None,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(DaemonError::Session("descriptor has no name".into()));
        }
        if self.name.contains(['/', '\\']) {
            return Err(DaemonError::Session(format!(
                "descriptor name '{}' contains a path separator",
                self.name
            )));
        }
        if self.source.is_empty() {
            return Err(DaemonError::Session("descriptor has no source".into()));
        }
        Ok(())
    }
}

/// Aggregate transfer rates across the whole session, bytes per second.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TransferTotals {
    /// Combined upload rate.
    pub upload_bps: f64,
    /// Combined download rate.
    pub download_bps: f64,
}

/// Interface the daemon drives; implemented by the built-in local session
/// and by any external transfer engine.
pub trait ShareSession {
    /// Accept a parsed descriptor into the session.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::Session`] when the session rejects the
    /// descriptor (duplicate, invalid). The caller still disposes of the
    /// source entry — a rejected descriptor is not retried.
    fn add_descriptor(&mut self, descriptor: Descriptor) -> Result<()>;

    /// Apply a freshly merged settings snapshot to the live session.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::Session`] when the settings cannot be applied.
    fn apply_settings(&mut self, settings: &SessionSettings) -> Result<()>;

    /// The settings currently in effect.
    fn settings(&self) -> &SessionSettings;

    /// Re-read peer blocklists; returns the number of loaded rule files.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::Session`] when the blocklist directory cannot
    /// be read.
    fn reload_blocklists(&mut self) -> Result<usize>;

    /// Current aggregate transfer rates.
    fn transfer_totals(&self) -> TransferTotals;

    /// Load work items persisted in the session's own store; returns how
    /// many were restored.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::Session`] when the store directory cannot be
    /// read.
    fn load_stored_work_items(&mut self) -> Result<usize>;

    /// Register the callback invoked when the engine reports it is closing.
    fn set_close_callback(&mut self, callback: Box<dyn Fn() + Send>);

    /// Handle to the session's log message queue.
    fn log_queue(&self) -> Arc<LogQueue>;

    /// Shut the session down. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::Session`] when final state cannot be released.
    fn close(&mut self) -> Result<()>;
}

/// Built-in in-process session.
pub struct LocalSession {
    settings: SessionSettings,
    config_dir: PathBuf,
    store_dir: PathBuf,
    descriptors: BTreeMap<String, Descriptor>,
    totals: TransferTotals,
    paused: bool,
    log: Arc<LogQueue>,
    close_callback: Option<Box<dyn Fn() + Send>>,
    listener: Option<TcpListener>,
    closed: bool,
}

impl std::fmt::Debug for LocalSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSession")
            .field("config_dir", &self.config_dir)
            .field("descriptors", &self.descriptors.len())
            .field("paused", &self.paused)
            .field("closed", &self.closed)
            .finish()
    }
}

impl LocalSession {
    /// Open a session: reserve the peer port and prepare the work-item
    /// store under the config directory.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::Session`] when the peer port cannot be bound
    /// or the store directory cannot be created.
    pub fn open(config: &DaemonConfig) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", config.settings.peer_port))
            .map_err(|err| DaemonError::Session(format!("cannot bind peer port: {err}")))?;
        let store_dir = config.config_dir.join(STORE_DIR);
        fs::create_dir_all(&store_dir)
            .map_err(|err| DaemonError::Session(format!("cannot create store dir: {err}")))?;

        let log = Arc::new(LogQueue::new());
        let port = listener.local_addr().map_or(0, |addr| addr.port());
        log.push(LogMessage::new(
            LogLevel::Info,
            Some("session"),
            format!("session open, peer port {port}"),
            file!(),
            line!(),
        ));

        Ok(Self {
            settings: config.settings.clone(),
            config_dir: config.config_dir.clone(),
            store_dir,
            descriptors: BTreeMap::new(),
            totals: TransferTotals::default(),
            paused: config.paused,
            log: Arc::clone(&log),
            close_callback: None,
            listener: Some(listener),
            closed: false,
        })
    }

    /// Whether transfers started paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Number of active descriptors.
    #[must_use]
    pub fn descriptor_count(&self) -> usize {
        self.descriptors.len()
    }

    /// Overwrite the reported transfer rates (used by the rate sampler and
    /// by tests).
    pub fn set_transfer_totals(&mut self, totals: TransferTotals) {
        self.totals = totals;
    }

    /// Simulate the engine announcing its own shutdown, firing the close
    /// callback registered by the lifecycle.
    pub fn announce_closing(&self) {
        if let Some(callback) = &self.close_callback {
            callback();
        }
    }

    fn store_path(&self, name: &str) -> PathBuf {
        self.store_dir.join(format!("{name}.share"))
    }
}

impl ShareSession for LocalSession {
    fn add_descriptor(&mut self, descriptor: Descriptor) -> Result<()> {
        if self.descriptors.contains_key(&descriptor.name) {
            return Err(DaemonError::Session(format!(
                "duplicate descriptor '{}'",
                descriptor.name
            )));
        }
        let raw = toml::to_string_pretty(&descriptor)
            .map_err(|err| DaemonError::Session(format!("cannot persist descriptor: {err}")))?;
        fs::write(self.store_path(&descriptor.name), raw)
            .map_err(|err| DaemonError::Session(format!("cannot persist descriptor: {err}")))?;

        self.log.push(LogMessage::new(
            LogLevel::Info,
            Some("session"),
            format!("added '{}'", descriptor.name),
            file!(),
            line!(),
        ));
        self.descriptors.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    fn apply_settings(&mut self, settings: &SessionSettings) -> Result<()> {
        debug!("applying settings snapshot to session");
        self.settings = settings.clone();
        Ok(())
    }

    fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    fn reload_blocklists(&mut self) -> Result<usize> {
        if !self.settings.blocklist_enabled {
            return Ok(0);
        }
        let dir = self.config_dir.join("blocklists");
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => {
                return Err(DaemonError::Session(format!(
                    "cannot read blocklist dir: {err}"
                )));
            }
        };
        Ok(entries.filter_map(std::result::Result::ok).count())
    }

    fn transfer_totals(&self) -> TransferTotals {
        self.totals
    }

    fn load_stored_work_items(&mut self) -> Result<usize> {
        let entries = match fs::read_dir(&self.store_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => {
                return Err(DaemonError::Session(format!("cannot read store dir: {err}")));
            }
        };

        let mut restored = 0;
        for entry in entries.filter_map(std::result::Result::ok) {
            let path = entry.path();
            if path.extension().and_then(std::ffi::OsStr::to_str) != Some("share") {
                continue;
            }
            match Descriptor::from_share_file(&path) {
                Ok(descriptor) => {
                    if !self.descriptors.contains_key(&descriptor.name) {
                        self.descriptors.insert(descriptor.name.clone(), descriptor);
                        restored += 1;
                    }
                }
                Err(err) => {
                    self.log.push(LogMessage::new(
                        LogLevel::Warn,
                        Some("session"),
                        format!("skipping stored item {}: {err}", path.display()),
                        file!(),
                        line!(),
                    ));
                }
            }
        }
        Ok(restored)
    }

    fn set_close_callback(&mut self, callback: Box<dyn Fn() + Send>) {
        self.close_callback = Some(callback);
    }

    fn log_queue(&self) -> Arc<LogQueue> {
        Arc::clone(&self.log)
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.listener = None;
        self.log.push(LogMessage::new(
            LogLevel::Info,
            Some("session"),
            "session closed",
            file!(),
            line!(),
        ));
        Ok(())
    }
}
