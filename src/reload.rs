//! Runtime reconfiguration.
//!
//! Reload requests arrive out-of-band (a SIGHUP listener or the harness
//! posts them) but always execute as ordinary reactor callbacks, so they
//! are serialized with every other daemon operation by construction. A
//! request raised before the session exists coalesces into a single
//! deferred application that runs at the end of startup.

use tracing::{error, info, warn};

use crate::config;
use crate::context::DaemonContext;
use crate::logsink::LogLevel;

/// Handle one reload request on the reactor thread.
///
/// With no session yet, the request is recorded for exactly one deferred
/// application and nothing else happens. With a live session it applies
/// fully and synchronously: reopen the log sink, re-read persisted
/// settings with the control-interface override forced on, push the merged
/// settings into the session, and refresh blocklists.
pub fn request_reload(ctx: &mut DaemonContext) {
    if ctx.session.is_none() {
        ctx.reload_deferred = true;
        info!("reload requested before session ready; deferred");
        return;
    }
    apply(ctx);
}

/// Apply a pending deferred reload, if one was recorded. Called once when
/// the session becomes ready; clears the flag so the request runs exactly
/// once.
pub fn apply_deferred(ctx: &mut DaemonContext) {
    if !ctx.reload_deferred {
        return;
    }
    ctx.reload_deferred = false;
    info!("applying deferred reload");
    apply(ctx);
}

fn apply(ctx: &mut DaemonContext) {
    // Reopen first so external log rotation takes effect even when the
    // settings file is broken.
    if let Err(err) = ctx.sink.reopen() {
        error!(%err, "log sink reopen failed, keeping previous sink");
    }

    let mut settings = match config::load_settings(&ctx.config.config_dir) {
        Ok(settings) => settings,
        Err(err) => {
            error!(%err, "settings reload failed, keeping previous settings");
            return;
        }
    };

    // An unreachable control interface on a running daemon is worse than an
    // unwanted one; the override is unconditional.
    settings.control_interface_enabled = true;

    match LogLevel::parse(&settings.log_level) {
        Some(level) => ctx.log_level = level,
        None => {
            eprintln!(
                "swarmd: ignoring unrecognized log level '{}'",
                settings.log_level
            );
            warn!(level = %settings.log_level, "unrecognized log level in reload, keeping previous");
        }
    }

    let Some(session) = ctx.session.as_mut() else {
        return;
    };
    if let Err(err) = session.apply_settings(&settings) {
        error!(%err, "session rejected reloaded settings");
    }
    match session.reload_blocklists() {
        Ok(count) => info!(rules = count, "blocklists refreshed"),
        Err(err) => error!(%err, "blocklist refresh failed"),
    }
    info!("reload applied");
}
