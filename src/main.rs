#![forbid(unsafe_code)]

//! `swarmd` — daemon binary.
//!
//! Parses the command line, layers it over the persisted settings, and
//! hands the merged configuration to the process supervisor, which runs the
//! session lifecycle to completion.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use swarmd::config::{CliOverrides, DaemonConfig};
use swarmd::supervisor::{DaemonHarness, ProcessSupervisor};
use swarmd::{DaemonError, Result};

#[derive(Debug, Parser)]
#[command(name = "swarmd", about = "Content-sharing session daemon", version, long_about = None)]
struct Cli {
    /// Directory holding settings.toml and the session store.
    #[arg(short = 'g', long)]
    config_dir: Option<PathBuf>,

    /// Run attached to the terminal instead of as a background service.
    #[arg(short = 'f', long)]
    foreground: bool,

    /// Start all transfers paused.
    #[arg(long)]
    paused: bool,

    /// Observe this directory for new descriptor files.
    #[arg(short = 'c', long)]
    watch_dir: Option<PathBuf>,

    /// Write completed transfers here.
    #[arg(long)]
    download_dir: Option<PathBuf>,

    /// Record the daemon's process id in this file.
    #[arg(long)]
    pid_file: Option<PathBuf>,

    /// Write session log messages to this file.
    #[arg(short = 'e', long)]
    log_file: Option<PathBuf>,

    /// Minimum session log severity (critical, error, warn, info, debug,
    /// trace).
    #[arg(long)]
    log_level: Option<String>,
}

fn main() {
    let args = Cli::parse();
    if let Err(err) = init_tracing() {
        eprintln!("swarmd: {err}");
        std::process::exit(1);
    }

    let code = match build_supervisor(args) {
        Ok(mut supervisor) => supervisor.start(),
        Err(err) => {
            error!(%err, "daemon could not start");
            1
        }
    };
    std::process::exit(code);
}

fn build_supervisor(args: Cli) -> Result<ProcessSupervisor> {
    let config_dir = args.config_dir.map_or_else(default_config_dir, Ok)?;
    let overrides = CliOverrides {
        watch_dir: args.watch_dir,
        download_dir: args.download_dir,
        paused: args.paused,
        foreground: args.foreground,
        pid_file: args.pid_file,
        log_file: args.log_file,
        log_level: args.log_level,
    };
    let config = DaemonConfig::build(config_dir, overrides)?;
    info!(config_dir = %config.config_dir.display(), "configuration loaded");
    ProcessSupervisor::new(config)
}

fn default_config_dir() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".config").join("swarmd"))
        .ok_or_else(|| {
            DaemonError::Config("no --config-dir given and HOME is unset".into())
        })
}

fn init_tracing() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| DaemonError::Config(format!("failed to init tracing: {err}")))
}
