//! Single-threaded cooperative event reactor.
//!
//! All daemon work — startup, periodic status ticks, watch-directory
//! callbacks, reconfiguration — executes on the one task that calls
//! [`EventReactor::run`]. Other threads (the `notify` watcher, signal
//! listeners) interact only through a [`ReactorHandle`], which posts
//! closures onto the loop or requests a stop; they never touch
//! [`DaemonContext`] directly.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::context::DaemonContext;
use crate::Result;

/// A unit of work executed on the reactor thread with exclusive access to
/// the daemon context. Runs to completion; never concurrently with another
/// callback.
pub type Callback = Box<dyn FnMut(&mut DaemonContext) + Send>;

/// Cloneable, thread-safe handle onto the reactor.
#[derive(Debug, Clone)]
pub struct ReactorHandle {
    tx: mpsc::UnboundedSender<Callback>,
    cancel: CancellationToken,
}

impl ReactorHandle {
    /// Post a closure for execution on the reactor thread. Silently dropped
    /// if the reactor has already shut down.
    pub fn post<F>(&self, callback: F)
    where
        F: FnMut(&mut DaemonContext) + Send + 'static,
    {
        if self.tx.send(Box::new(callback)).is_err() {
            trace!("reactor gone, dropping posted callback");
        }
    }

    /// Mark the loop for exit after the currently running callback returns.
    /// Idempotent; safe from any thread, including from inside a callback.
    pub fn request_stop(&self) {
        self.cancel.cancel();
    }

    /// Whether a stop has been requested.
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The stop token, for tasks that want to select on it.
    #[must_use]
    pub fn stop_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

struct Periodic {
    interval: Duration,
    callback: Callback,
}

/// The dispatcher: owns the callback queue and the single periodic timer.
pub struct EventReactor {
    rx: mpsc::UnboundedReceiver<Callback>,
    handle: ReactorHandle,
    periodic: Option<Periodic>,
}

impl std::fmt::Debug for EventReactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventReactor")
            .field("periodic", &self.periodic.as_ref().map(|p| p.interval))
            .finish()
    }
}

impl EventReactor {
    /// Construct the reactor. Construction failure is fatal to startup.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DaemonError::Reactor`] if the dispatch queue cannot
    /// be created.
    pub fn new() -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        Ok(Self {
            rx,
            handle: ReactorHandle {
                tx,
                cancel: CancellationToken::new(),
            },
            periodic: None,
        })
    }

    /// A new handle onto this reactor.
    #[must_use]
    pub fn handle(&self) -> ReactorHandle {
        self.handle.clone()
    }

    /// Install the single periodic timer. Replaces any previous one.
    pub fn schedule_periodic(&mut self, interval: Duration, callback: Callback) {
        self.periodic = Some(Periodic { interval, callback });
    }

    /// Cancel and free the periodic timer. No-op if never installed.
    pub fn cancel_periodic(&mut self) {
        self.periodic = None;
    }

    /// Whether a periodic timer is installed.
    #[must_use]
    pub fn has_periodic(&self) -> bool {
        self.periodic.is_some()
    }

    /// Discard all queued callbacks and refuse new ones.
    pub fn close(&mut self) {
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
    }

    /// Run the dispatch loop until a stop is requested, executing posted
    /// callbacks and the periodic timer on this task. Returns the process
    /// exit code.
    pub async fn run(&mut self, ctx: &mut DaemonContext) -> i32 {
        let cancel = self.handle.cancel.clone();
        let mut ticker = self.periodic.as_ref().map(|periodic| {
            let mut interval = tokio::time::interval(periodic.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });

        debug!("reactor running");
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                event = self.rx.recv() => {
                    match event {
                        Some(mut callback) => callback(ctx),
                        None => break,
                    }
                }
                () = next_tick(&mut ticker) => {
                    if let Some(periodic) = self.periodic.as_mut() {
                        (periodic.callback)(ctx);
                    }
                }
            }
            if cancel.is_cancelled() {
                break;
            }
        }
        debug!("reactor exiting");
        0
    }
}

/// Resolve when the periodic timer fires; pends forever when no timer is
/// installed so the `select!` arm never wins.
async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
