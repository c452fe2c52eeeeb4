#![forbid(unsafe_code)]

//! swarmd — daemon process controller for a content-sharing session.
//!
//! The crate turns a session library into a long-running background
//! service: one single-threaded event reactor, a watched descriptor
//! directory with a three-outcome retry protocol, signal-driven runtime
//! reconfiguration, periodic status/log flushing, and a strictly ordered
//! startup/shutdown sequence with fail-safe teardown.

pub mod config;
pub mod context;
pub mod errors;
pub mod lifecycle;
pub mod logsink;
pub mod reactor;
pub mod reload;
pub mod session;
pub mod status;
pub mod supervisor;
pub mod units;
pub mod watchdir;

pub use config::DaemonConfig;
pub use errors::{DaemonError, Result};
