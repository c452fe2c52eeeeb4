//! Watch-directory ingestion with the three-outcome retry protocol.
//!
//! Two delivery paths feed [`on_entry_observed`]: a `notify` watcher posts
//! freshly created or modified entries onto the reactor, and a fixed
//! 10-second rescan redelivers everything still pending — which is what
//! turns `Retry` into an actual retry without any per-entry bookkeeping.
//! Both paths only post callbacks; all classification and disk mutation
//! happens on the reactor thread.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::context::DaemonContext;
use crate::reactor::ReactorHandle;
use crate::session::Descriptor;
use crate::{DaemonError, Result};

/// Suffix appended to an accepted entry that is kept on disk, so future
/// scans classify it as already ingested.
pub const ADDED_SUFFIX: &str = ".added";

/// Fixed rescan period driving `Retry` redelivery. Retries are one read and
/// one parse, so a short flat cadence beats backoff bookkeeping.
pub const RESCAN_INTERVAL: Duration = Duration::from_secs(10);

/// Outcome of observing one directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// Descriptor handed to the session; the entry was terminally disposed.
    Accept,
    /// Not a work descriptor; never revisited as a result of this call.
    Ignore,
    /// Not ingestible yet; the untouched entry is redelivered on a future
    /// rescan.
    Retry,
}

#[derive(Debug, Clone, Copy)]
enum EntryKind {
    Share,
    Link,
}

fn classify(name: &str) -> Option<EntryKind> {
    if name.ends_with(".share") {
        Some(EntryKind::Share)
    } else if name.ends_with(".link") {
        Some(EntryKind::Link)
    } else {
        None
    }
}

/// Observe one directory entry and drive it through classification, parse,
/// session hand-off, and terminal disposal.
pub fn on_entry_observed(dir: &Path, name: &str, ctx: &mut DaemonContext) -> WatchOutcome {
    let Some(kind) = classify(name) else {
        return WatchOutcome::Ignore;
    };

    let path = dir.join(name);
    // A recognized name on something that is not a regular file (a
    // directory, a socket) never becomes parseable; ignored, not retried.
    if !path.is_file() {
        return WatchOutcome::Ignore;
    }

    let parsed = match kind {
        EntryKind::Share => Descriptor::from_share_file(&path),
        EntryKind::Link => Descriptor::from_link_file(&path),
    };
    let descriptor = match parsed {
        Ok(descriptor) => descriptor,
        Err(err) => {
            // Possibly still being written; leave it for the next rescan.
            debug!(entry = name, %err, "descriptor not ingestible yet");
            return WatchOutcome::Retry;
        }
    };

    let Some(session) = ctx.session.as_mut() else {
        debug!(entry = name, "no session yet, retrying later");
        return WatchOutcome::Retry;
    };

    let delete_source = descriptor
        .delete_source
        .unwrap_or(session.settings().trash_watch_files);

    if let Err(err) = session.add_descriptor(descriptor) {
        // A descriptor the session already rejected must not loop forever;
        // dispose of the entry exactly like a successful hand-off.
        error!(entry = name, %err, "session rejected descriptor");
    } else {
        info!(entry = name, "descriptor ingested");
    }

    dispose(&path, name, delete_source);
    WatchOutcome::Accept
}

/// Exactly one terminal disk action on the accept path: delete the source,
/// or rename it with [`ADDED_SUFFIX`].
fn dispose(path: &Path, name: &str, delete_source: bool) {
    if delete_source {
        if let Err(err) = std::fs::remove_file(path) {
            warn!(entry = name, %err, "failed to delete accepted entry");
        }
        return;
    }
    let renamed = path.with_file_name(format!("{name}{ADDED_SUFFIX}"));
    if let Err(err) = std::fs::rename(path, &renamed) {
        warn!(entry = name, %err, "failed to rename accepted entry");
    }
}

/// Scan the whole directory once, observing every entry in name order.
pub fn scan(dir: &Path, ctx: &mut DaemonContext) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(dir = %dir.display(), %err, "watch directory scan failed");
            return;
        }
    };
    let mut names: Vec<String> = entries
        .filter_map(std::result::Result::ok)
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort_unstable();
    for name in names {
        on_entry_observed(dir, &name, ctx);
    }
}

/// Running ingestor: holds the `notify` watcher and the rescan ticker for
/// its own lifetime.
pub struct WatchDirectoryIngestor {
    dir: PathBuf,
    watcher: Option<RecommendedWatcher>,
    rescan: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for WatchDirectoryIngestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchDirectoryIngestor")
            .field("dir", &self.dir)
            .finish()
    }
}

impl WatchDirectoryIngestor {
    /// Start observing `dir`, posting observations onto the reactor. The
    /// rescan ticker's first tick performs the initial sweep of entries
    /// already present. Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::Watch`] when the directory cannot be created
    /// or the native watcher cannot be constructed — fatal to startup when
    /// a watch path was explicitly configured.
    pub fn start(dir: &Path, reactor: ReactorHandle) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|err| {
            DaemonError::Watch(format!(
                "cannot create watch dir {}: {err}",
                dir.display()
            ))
        })?;

        let watcher = Self::start_watcher(dir, reactor.clone())?;
        let cancel = reactor.stop_token().child_token();
        let rescan = Self::start_rescan(dir.to_path_buf(), reactor, cancel.clone());

        info!(dir = %dir.display(), "watch directory ingestor started");
        Ok(Self {
            dir: dir.to_path_buf(),
            watcher: Some(watcher),
            rescan: Some(rescan),
            cancel,
        })
    }

    /// The observed directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stop observing. No-op when already stopped; safe to call during
    /// shutdown regardless of how far startup got.
    pub fn stop(&mut self) {
        self.cancel.cancel();
        self.watcher = None;
        if let Some(task) = self.rescan.take() {
            task.abort();
        }
        debug!(dir = %self.dir.display(), "watch directory ingestor stopped");
    }

    fn start_watcher(dir: &Path, reactor: ReactorHandle) -> Result<RecommendedWatcher> {
        let watch_dir = dir.to_path_buf();
        let mut watcher = notify::recommended_watcher(
            move |result: std::result::Result<Event, notify::Error>| match result {
                Ok(event)
                    if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) =>
                {
                    for path in event.paths {
                        if path.parent() != Some(watch_dir.as_path()) {
                            continue;
                        }
                        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                            continue;
                        };
                        let dir = watch_dir.clone();
                        let name = name.to_owned();
                        // Marshal onto the reactor thread; the notify
                        // callback itself never touches daemon state.
                        reactor.post(move |ctx| {
                            on_entry_observed(&dir, &name, ctx);
                        });
                    }
                }
                Err(err) => warn!(%err, "watch directory event error"),
                _ => {}
            },
        )
        .map_err(|err| DaemonError::Watch(format!("cannot create watcher: {err}")))?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|err| {
                DaemonError::Watch(format!("cannot watch {}: {err}", dir.display()))
            })?;
        Ok(watcher)
    }

    fn start_rescan(
        dir: PathBuf,
        reactor: ReactorHandle,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(RESCAN_INTERVAL);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        let dir = dir.clone();
                        reactor.post(move |ctx| scan(&dir, ctx));
                    }
                }
            }
        })
    }
}
