//! The single owned aggregate of daemon-wide mutable state.

use std::path::PathBuf;

use crate::config::DaemonConfig;
use crate::logsink::{LogLevel, LogSink};
use crate::reactor::ReactorHandle;
use crate::session::ShareSession;
use crate::supervisor::NotifyHandle;
use crate::units::Formatters;

/// Daemon-wide mutable state. Exactly one instance exists per process,
/// created when the lifecycle starts and destroyed when it stops. Every
/// component receives a reference; nothing copies it, and only the reactor
/// thread touches it after startup.
pub struct DaemonContext {
    /// Immutable-after-build configuration.
    pub config: DaemonConfig,
    /// Active log sink for drained session messages.
    pub sink: LogSink,
    /// Minimum severity written to the sink; reload may change it.
    pub log_level: LogLevel,
    /// Display-unit formatters initialized at startup.
    pub formatters: Formatters,
    /// Handle onto the reactor for posting and stop requests.
    pub reactor: ReactorHandle,
    /// The live session. `Some` exactly between completed startup and begun
    /// shutdown; reconfiguration checks this to choose apply-vs-defer.
    pub session: Option<Box<dyn ShareSession>>,
    /// A reload arrived before the session existed and awaits one
    /// application.
    pub reload_deferred: bool,
    /// Configured pidfile path, if any.
    pub pidfile: Option<PathBuf>,
    /// Whether this process actually created the pidfile (removal is gated
    /// on it).
    pub pidfile_created: bool,
    /// Best-effort supervisor notification channel.
    pub notify: NotifyHandle,
}

impl std::fmt::Debug for DaemonContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaemonContext")
            .field("session", &self.session.is_some())
            .field("reload_deferred", &self.reload_deferred)
            .field("pidfile", &self.pidfile)
            .field("pidfile_created", &self.pidfile_created)
            .finish()
    }
}
