//! Ordered session startup and shutdown.
//!
//! [`SessionLifecycle`] owns the one [`DaemonContext`], the reactor, and
//! the ingestor, and walks the strict state machine
//! `Created → Starting → Running → Stopping → Stopped`. Shutdown runs
//! exactly once, unconditionally, whether startup completed or failed
//! partway; every teardown step tolerates a never-created resource and
//! logs-but-continues on error.

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::{self, DaemonConfig};
use crate::context::DaemonContext;
use crate::logsink::LogSink;
use crate::reactor::{EventReactor, ReactorHandle};
use crate::session::{LocalSession, ShareSession};
use crate::supervisor::{self, NotifyHandle};
use crate::units::Formatters;
use crate::watchdir::WatchDirectoryIngestor;
use crate::{reload, status, DaemonError, Result};

/// Strictly sequential lifecycle states; no state is skipped even on error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Constructed, not yet started.
    Created,
    /// Ordered startup in progress.
    Starting,
    /// Reactor loop live.
    Running,
    /// Ordered shutdown in progress.
    Stopping,
    /// Terminal.
    Stopped,
}

/// Owner of the daemon context and the ordered start/stop sequences.
pub struct SessionLifecycle {
    state: LifecycleState,
    reactor: EventReactor,
    ctx: DaemonContext,
    ingestor: Option<WatchDirectoryIngestor>,
    signal_tasks: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for SessionLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLifecycle")
            .field("state", &self.state)
            .field("ctx", &self.ctx)
            .finish()
    }
}

impl SessionLifecycle {
    /// Construct the lifecycle: reactor first (its failure aborts startup
    /// with a nonzero exit), then the context around it.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::Reactor`] if the reactor cannot be built or
    /// [`DaemonError::LogSink`] if a configured log file cannot be opened.
    pub fn new(config: DaemonConfig) -> Result<Self> {
        let reactor = EventReactor::new()?;
        let sink = initial_sink(&config)?;
        let log_level = config.log_level;
        let pidfile = config.pid_file.clone();

        let ctx = DaemonContext {
            config,
            sink,
            log_level,
            formatters: Formatters::si(),
            reactor: reactor.handle(),
            session: None,
            reload_deferred: false,
            pidfile,
            pidfile_created: false,
            notify: NotifyHandle::from_env(),
        };

        Ok(Self {
            state: LifecycleState::Created,
            reactor,
            ctx,
            ingestor: None,
            signal_tasks: Vec::new(),
        })
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// A handle onto the reactor; valid before, during, and after `run`.
    #[must_use]
    pub fn handle(&self) -> ReactorHandle {
        self.reactor.handle()
    }

    /// The daemon context (inspection).
    #[must_use]
    pub fn context(&self) -> &DaemonContext {
        &self.ctx
    }

    /// The daemon context, mutable. Callers must be on the reactor thread.
    pub fn context_mut(&mut self) -> &mut DaemonContext {
        &mut self.ctx
    }

    /// Run the daemon to completion: ordered startup, the reactor loop,
    /// then the unconditional ordered shutdown. Returns the exit code.
    pub async fn run(&mut self) -> i32 {
        let code = match self.start_up() {
            Ok(()) => {
                self.state = LifecycleState::Running;
                self.reactor.run(&mut self.ctx).await
            }
            Err(err) => {
                error!(%err, "startup failed");
                1
            }
        };
        self.shut_down();
        code
    }

    /// The ordered startup sequence. Any error falls through to the
    /// unconditional shutdown in [`run`](Self::run).
    fn start_up(&mut self) -> Result<()> {
        self.state = LifecycleState::Starting;
        info!(config_dir = %self.ctx.config.config_dir.display(), "starting");

        // Display-unit formatters come up before anything can log a rate;
        // the session bind below initializes the network side.
        self.ctx.formatters = Formatters::si();

        let mut session: Box<dyn ShareSession> = Box::new(LocalSession::open(&self.ctx.config)?);

        // The engine signals its own demise through this callback; a stop
        // request from here is indistinguishable from an external one.
        let close_handle = self.reactor.handle();
        session.set_close_callback(Box::new(move || close_handle.request_stop()));
        self.ctx.session = Some(session);

        // Persist the effective (merged) settings back to the config dir.
        if let Err(err) = self.persist_settings() {
            warn!(%err, "could not persist effective settings");
        }

        self.write_pidfile()?;

        // A reload that arrived before the session existed runs exactly
        // once, now.
        reload::apply_deferred(&mut self.ctx);

        if let Some(dir) = self.ctx.config.watch_dir().map(std::path::Path::to_path_buf) {
            let ingestor = WatchDirectoryIngestor::start(&dir, self.reactor.handle())?;
            self.ingestor = Some(ingestor);
        }

        if let Some(session) = self.ctx.session.as_mut() {
            match session.load_stored_work_items() {
                Ok(count) => info!(count, "restored stored work items"),
                Err(err) => error!(%err, "could not restore stored work items"),
            }
        }

        self.reactor
            .schedule_periodic(status::TICK_INTERVAL, Box::new(status::tick));

        self.spawn_signal_listeners();

        self.ctx.notify.ready();
        info!("daemon ready");
        Ok(())
    }

    /// The ordered shutdown sequence. Guarded to run exactly once no matter
    /// how many stop requests raced in; every step tolerates its resource
    /// never having been created.
    fn shut_down(&mut self) {
        if matches!(
            self.state,
            LifecycleState::Stopping | LifecycleState::Stopped
        ) {
            return;
        }
        self.state = LifecycleState::Stopping;
        info!("shutting down");
        self.ctx.notify.status("Closing session");

        if let Some(mut ingestor) = self.ingestor.take() {
            ingestor.stop();
        }

        self.reactor.cancel_periodic();
        self.reactor.close();

        if let Err(err) = self.persist_settings() {
            error!(%err, "could not persist settings at shutdown");
        }

        // Keep the queue alive past the session so messages emitted while
        // closing still reach the sink.
        let queue = self.ctx.session.as_ref().map(|session| session.log_queue());
        if let Some(mut session) = self.ctx.session.take() {
            if let Err(err) = session.close() {
                error!(%err, "session close failed");
            }
        }
        if let Some(queue) = queue {
            let level = self.ctx.log_level;
            let messages: Vec<_> = queue
                .drain()
                .into_iter()
                .filter(|message| message.level <= level)
                .collect();
            if let Err(err) = self.ctx.sink.write_batch(&messages) {
                error!(%err, "final log drain failed");
            }
        }

        if self.ctx.pidfile_created {
            if let Some(path) = &self.ctx.pidfile {
                supervisor::remove_pidfile(path);
            }
        }

        for task in self.signal_tasks.drain(..) {
            task.abort();
        }

        self.ctx.notify.stopped();
        self.state = LifecycleState::Stopped;
        info!("stopped");
    }

    /// Write the live session's settings (or the configured ones when no
    /// session exists) back to `settings.toml`.
    fn persist_settings(&self) -> Result<()> {
        let settings = self
            .ctx
            .session
            .as_ref()
            .map_or_else(|| self.ctx.config.settings.clone(), |s| s.settings().clone());
        config::save_settings(&self.ctx.config.config_dir, &settings)
    }

    /// Pidfile startup step: refuse to start over a live daemon, otherwise
    /// write (truncating any stale file). Write failure is logged and the
    /// daemon runs on without a pidfile.
    fn write_pidfile(&mut self) -> Result<()> {
        let Some(path) = self.ctx.pidfile.clone() else {
            return Ok(());
        };
        if let Some(pid) = supervisor::pidfile_live_pid(&path) {
            return Err(DaemonError::Pidfile(format!(
                "another daemon is already running (pid {pid})"
            )));
        }
        match supervisor::write_pidfile(&path) {
            Ok(()) => self.ctx.pidfile_created = true,
            Err(err) => error!(%err, "continuing without a pidfile"),
        }
        Ok(())
    }

    #[cfg(unix)]
    fn spawn_signal_listeners(&mut self) {
        use tokio::signal::unix::{signal, SignalKind};

        let stop_handle = self.reactor.handle();
        self.signal_tasks.push(tokio::spawn(async move {
            let ctrl_c = tokio::signal::ctrl_c();
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {}
                        _ = sigterm.recv() => {}
                    }
                }
                Err(err) => {
                    warn!(%err, "no SIGTERM handler, using ctrl-c only");
                    let _ = ctrl_c.await;
                }
            }
            info!("termination signal received");
            stop_handle.request_stop();
        }));

        // SIGHUP never reconfigures from signal context: the listener only
        // posts the request; the reactor applies it as a normal callback.
        let reload_handle = self.reactor.handle();
        self.signal_tasks.push(tokio::spawn(async move {
            match signal(SignalKind::hangup()) {
                Ok(mut sighup) => {
                    while sighup.recv().await.is_some() {
                        info!("reload signal received");
                        reload_handle.post(reload::request_reload);
                    }
                }
                Err(err) => warn!(%err, "no SIGHUP handler, reload signal unavailable"),
            }
        }));
    }

    #[cfg(not(unix))]
    fn spawn_signal_listeners(&mut self) {
        let stop_handle = self.reactor.handle();
        self.signal_tasks.push(tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(%err, "ctrl-c handler failed");
                return;
            }
            info!("termination signal received");
            stop_handle.request_stop();
        }));
    }
}

fn initial_sink(config: &DaemonConfig) -> Result<LogSink> {
    match &config.log_file {
        Some(path) => LogSink::open_file(path),
        None if config.foreground => Ok(LogSink::stderr()),
        None => Ok(LogSink::syslog()),
    }
}
