//! Error types shared across the daemon.

use std::fmt::{Display, Formatter};

/// Shared daemon result type.
pub type Result<T> = std::result::Result<T, DaemonError>;

/// Daemon error enumeration covering all failure modes of the process
/// controller.
#[derive(Debug)]
pub enum DaemonError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Persisted settings could not be read or written.
    Settings(String),
    /// Event reactor construction or dispatch failure.
    Reactor(String),
    /// Watch-directory observation failure.
    Watch(String),
    /// Transfer session construction or operation failure.
    Session(String),
    /// Pidfile ownership conflict or write failure.
    Pidfile(String),
    /// Log sink open, write, or reopen failure.
    LogSink(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for DaemonError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Settings(msg) => write!(f, "settings: {msg}"),
            Self::Reactor(msg) => write!(f, "reactor: {msg}"),
            Self::Watch(msg) => write!(f, "watch: {msg}"),
            Self::Session(msg) => write!(f, "session: {msg}"),
            Self::Pidfile(msg) => write!(f, "pidfile: {msg}"),
            Self::LogSink(msg) => write!(f, "log sink: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for DaemonError {}

impl From<toml::de::Error> for DaemonError {
    fn from(err: toml::de::Error) -> Self {
        Self::Settings(format!("invalid settings: {err}"))
    }
}

impl From<toml::ser::Error> for DaemonError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Settings(format!("unserializable settings: {err}"))
    }
}

impl From<std::io::Error> for DaemonError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
