//! Process supervision: the harness seam, pidfile lifecycle, and
//! supervisor notification.
//!
//! [`DaemonHarness`] is the contract an OS-level daemonizing harness drives:
//! `start` on launch, `stop` on a termination signal, `reconfigure` on a
//! reload signal. [`ProcessSupervisor`] implements it by delegating to the
//! session lifecycle. [`NotifyHandle`] speaks the `sd_notify` key=value
//! protocol to `$NOTIFY_SOCKET` when present and is a no-op otherwise —
//! delivery failures never affect the daemon.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::config::DaemonConfig;
use crate::lifecycle::SessionLifecycle;
use crate::reactor::ReactorHandle;
use crate::reload;
use crate::{DaemonError, Result};

/// Lifecycle callbacks consumed by an external daemonizing harness.
pub trait DaemonHarness {
    /// Run the daemon to completion; returns the process exit code.
    fn start(&mut self) -> i32;
    /// Request an orderly shutdown. Idempotent; callable from any thread.
    fn stop(&mut self);
    /// Request a runtime reconfiguration. Callable from any thread.
    fn reconfigure(&mut self);
}

/// The shipped harness implementation: owns the lifecycle and the runtime
/// it executes on.
pub struct ProcessSupervisor {
    lifecycle: SessionLifecycle,
    handle: ReactorHandle,
}

impl ProcessSupervisor {
    /// Build the supervisor. Reactor construction failure surfaces here and
    /// is fatal.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::Reactor`] when the event reactor cannot be
    /// constructed.
    pub fn new(config: DaemonConfig) -> Result<Self> {
        let lifecycle = SessionLifecycle::new(config)?;
        let handle = lifecycle.handle();
        Ok(Self { lifecycle, handle })
    }

    /// Handle onto the reactor, for embedding callers that wire their own
    /// signals.
    #[must_use]
    pub fn handle(&self) -> ReactorHandle {
        self.handle.clone()
    }
}

impl DaemonHarness for ProcessSupervisor {
    fn start(&mut self) -> i32 {
        // All callbacks run on this one thread; spawned helper tasks
        // (signals, rescan ticker) share it cooperatively.
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                error!(%err, "failed to build reactor runtime");
                return 1;
            }
        };
        runtime.block_on(self.lifecycle.run())
    }

    fn stop(&mut self) {
        self.handle.request_stop();
    }

    fn reconfigure(&mut self) {
        self.handle.post(reload::request_reload);
    }
}

// ─── Pidfile ────────────────────────────────────────────

/// Write the decimal process id to `path` with truncate-on-open semantics.
///
/// # Errors
///
/// Returns [`DaemonError::Pidfile`] on write failure. The caller logs and
/// continues — a daemon without a pidfile still runs.
pub fn write_pidfile(path: &Path) -> Result<()> {
    fs::write(path, format!("{}\n", std::process::id()))
        .map_err(|err| DaemonError::Pidfile(format!("cannot write {}: {err}", path.display())))?;
    info!(path = %path.display(), "pidfile written");
    Ok(())
}

/// Remove the pidfile. Only called when this process created it; a missing
/// file is not an error.
pub fn remove_pidfile(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => info!(path = %path.display(), "pidfile removed"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), %err, "failed to remove pidfile"),
    }
}

/// The pid recorded in an existing pidfile, when that process is still
/// alive. `None` for a missing, malformed, or stale file — stale files are
/// overwritten by the next startup.
#[must_use]
pub fn pidfile_live_pid(path: &Path) -> Option<u32> {
    let raw = fs::read_to_string(path).ok()?;
    let pid: u32 = raw.trim().parse().ok()?;
    if pid == std::process::id() {
        return None;
    }
    process_alive(pid).then_some(pid)
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    // Signal 0 probes existence without delivering anything; EPERM still
    // means the process exists.
    match nix::sys::signal::kill(
        nix::unistd::Pid::from_raw(pid),
        None::<nix::sys::signal::Signal>,
    ) {
        Ok(()) => true,
        Err(nix::errno::Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    false
}

// ─── Supervisor notification ────────────────────────────

/// Best-effort `sd_notify`-style channel to an external process supervisor.
///
/// Messages are textual `KEY=value` lines sent as single datagrams. When no
/// supervisor socket is configured the handle is inert, which is the
/// acceptable no-op substitute the protocol allows.
#[derive(Debug)]
pub struct NotifyHandle {
    socket: Option<PathBuf>,
}

impl NotifyHandle {
    /// Build from `$NOTIFY_SOCKET`; inert when unset or when the socket
    /// uses the abstract namespace (unsupported by `std`).
    #[must_use]
    pub fn from_env() -> Self {
        let socket = std::env::var_os("NOTIFY_SOCKET")
            .map(PathBuf::from)
            .filter(|path| !path.as_os_str().is_empty())
            .filter(|path| {
                let abstract_ns = path.to_string_lossy().starts_with('@');
                if abstract_ns {
                    debug!("abstract NOTIFY_SOCKET namespace unsupported, notifications disabled");
                }
                !abstract_ns
            });
        Self { socket }
    }

    /// An inert handle for embedders and tests.
    #[must_use]
    pub fn disabled() -> Self {
        Self { socket: None }
    }

    /// Whether notifications will actually be sent.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.socket.is_some()
    }

    /// Announce readiness and the main pid.
    pub fn ready(&self) {
        self.send(&format!("READY=1\nMAINPID={}", std::process::id()));
    }

    /// Publish a free-form status line.
    pub fn status(&self, text: &str) {
        self.send(&format!("STATUS={text}"));
    }

    /// Final empty status sent once shutdown completes.
    pub fn stopped(&self) {
        self.send("STATUS=");
    }

    #[cfg(unix)]
    fn send(&self, payload: &str) {
        let Some(path) = &self.socket else { return };
        let result = std::os::unix::net::UnixDatagram::unbound()
            .and_then(|socket| socket.send_to(payload.as_bytes(), path));
        if let Err(err) = result {
            // Advisory only; never let delivery failure reach the reactor.
            debug!(%err, "supervisor notification dropped");
        }
    }

    #[cfg(not(unix))]
    fn send(&self, _payload: &str) {}
}
