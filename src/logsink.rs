//! Session log queue and the sink it drains into.
//!
//! The transfer session emits leveled messages into a [`LogQueue`]; the
//! status tick drains the queue in arrival order and renders the batch to
//! the active [`LogSink`], flushing once per batch. Three sinks exist: an
//! open log file (timestamped, reopenable for external rotation), standard
//! error (foreground mode), and a syslog-style rendering used when the
//! daemon runs in the background without a log file (no timestamp, severity
//! mapped to the nearest syslog priority name).

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Stderr, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::{DaemonError, Result};

/// Message severity, most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Unrecoverable condition.
    Critical,
    /// Operation failed.
    Error,
    /// Suspicious but survivable condition.
    Warn,
    /// Normal operational message.
    Info,
    /// Troubleshooting detail.
    Debug,
    /// Very fine-grained detail.
    Trace,
}

impl LogLevel {
    /// Short label used by the file and stderr renderings.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Critical => "CRT",
            Self::Error => "ERR",
            Self::Warn => "WRN",
            Self::Info => "INF",
            Self::Debug => "DBG",
            Self::Trace => "TRC",
        }
    }

    /// Nearest native syslog priority name.
    #[must_use]
    pub fn syslog_priority(self) -> &'static str {
        match self {
            Self::Critical => "crit",
            Self::Error => "err",
            Self::Warn => "warning",
            Self::Info => "info",
            // syslog has no trace priority; both map to debug.
            Self::Debug | Self::Trace => "debug",
        }
    }

    /// Parse a settings/CLI level name. Returns `None` for unknown names so
    /// the caller can warn and drop the single bad option.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "critical" => Some(Self::Critical),
            "error" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            "trace" => Some(Self::Trace),
            _ => None,
        }
    }
}

/// One queued log message.
#[derive(Debug, Clone)]
pub struct LogMessage {
    /// Message severity.
    pub level: LogLevel,
    /// Emitting component, when known.
    pub component: Option<String>,
    /// Message text.
    pub text: String,
    /// Source file that emitted the message.
    pub file: &'static str,
    /// Source line that emitted the message.
    pub line: u32,
    /// Time the message was queued.
    pub timestamp: DateTime<Utc>,
}

impl LogMessage {
    /// Build a message stamped with the current time.
    #[must_use]
    pub fn new(
        level: LogLevel,
        component: Option<&str>,
        text: impl Into<String>,
        file: &'static str,
        line: u32,
    ) -> Self {
        Self {
            level,
            component: component.map(str::to_owned),
            text: text.into(),
            file,
            line,
            timestamp: Utc::now(),
        }
    }
}

/// FIFO queue of session log messages, drained once per status tick.
///
/// The queue is shared between the session (producer) and the status
/// reporter (consumer) behind an `Arc`. A `std::sync::Mutex` is used rather
/// than an async lock: pushes and drains are short and never held across an
/// await point.
#[derive(Debug, Default)]
pub struct LogQueue {
    inner: Mutex<VecDeque<LogMessage>>,
}

impl LogQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to the queue.
    pub fn push(&self, message: LogMessage) {
        let mut guard = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.push_back(message);
    }

    /// Remove and return all queued messages in arrival order.
    #[must_use]
    pub fn drain(&self) -> Vec<LogMessage> {
        let mut guard = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.drain(..).collect()
    }

    /// Number of queued messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The active rendering target for drained session messages.
pub enum LogSink {
    /// Open log file; timestamped lines, reopened on reload for rotation.
    File {
        /// Path the file was opened from, kept for reopen.
        path: PathBuf,
        /// Buffered writer over the open file.
        writer: BufWriter<File>,
    },
    /// Standard error with timestamps (foreground mode).
    Stderr(Stderr),
    /// Syslog-style stderr rendering: no timestamp, priority tag first
    /// (background mode without a configured log file).
    Syslog(Stderr),
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File { path, .. } => f.debug_struct("File").field("path", path).finish(),
            Self::Stderr(_) => f.write_str("Stderr"),
            Self::Syslog(_) => f.write_str("Syslog"),
        }
    }
}

impl LogSink {
    /// Open (or create) a log file for appending.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::LogSink`] if the file cannot be opened.
    pub fn open_file(path: &Path) -> Result<Self> {
        let file = open_append(path)?;
        Ok(Self::File {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    /// Stderr sink used in foreground mode.
    #[must_use]
    pub fn stderr() -> Self {
        Self::Stderr(std::io::stderr())
    }

    /// Syslog-style sink used in background mode without a log file.
    #[must_use]
    pub fn syslog() -> Self {
        Self::Syslog(std::io::stderr())
    }

    /// Reopen the underlying file so an external rotation (rename away +
    /// recreate) takes effect. A no-op for the stderr and syslog sinks.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::LogSink`] if the file cannot be reopened; the
    /// previous writer is kept in that case.
    pub fn reopen(&mut self) -> Result<()> {
        if let Self::File { path, writer } = self {
            let _ = writer.flush();
            let file = open_append(path)?;
            *writer = BufWriter::new(file);
        }
        Ok(())
    }

    /// Render a batch of messages and flush once afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::LogSink`] on write or flush failure.
    pub fn write_batch(&mut self, messages: &[LogMessage]) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }
        match self {
            Self::File { writer, .. } => {
                for message in messages {
                    write_timestamped(writer, message)?;
                }
                writer
                    .flush()
                    .map_err(|err| DaemonError::LogSink(format!("flush failed: {err}")))?;
            }
            Self::Stderr(stderr) => {
                let mut lock = stderr.lock();
                for message in messages {
                    write_timestamped(&mut lock, message)?;
                }
                let _ = lock.flush();
            }
            Self::Syslog(stderr) => {
                let mut lock = stderr.lock();
                for message in messages {
                    write_syslog(&mut lock, message)?;
                }
                let _ = lock.flush();
            }
        }
        Ok(())
    }
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| {
            DaemonError::LogSink(format!("failed to open log file {}: {err}", path.display()))
        })
}

fn write_timestamped(out: &mut impl Write, message: &LogMessage) -> Result<()> {
    let stamp = message.timestamp.format("%Y-%m-%d %H:%M:%S%.3f");
    let component = message.component.as_deref().unwrap_or("daemon");
    writeln!(
        out,
        "[{stamp}] {} {component}: {} ({}:{})",
        message.level.label(),
        message.text,
        message.file,
        message.line
    )
    .map_err(|err| DaemonError::LogSink(format!("write failed: {err}")))
}

fn write_syslog(out: &mut impl Write, message: &LogMessage) -> Result<()> {
    let component = message.component.as_deref().unwrap_or("daemon");
    writeln!(
        out,
        "daemon.{} {component}: {}",
        message.level.syslog_priority(),
        message.text
    )
    .map_err(|err| DaemonError::LogSink(format!("write failed: {err}")))
}
