//! Periodic status tick: log draining and throughput reporting.

use std::time::Duration;

use tracing::warn;

use crate::context::DaemonContext;
use crate::session::TransferTotals;
use crate::units::Formatters;

/// Fixed tick interval for the status reporter.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Below this combined rate (bytes/sec, per direction) the daemon reports
/// itself idle.
pub const IDLE_THRESHOLD: f64 = 0.01;

/// One status tick, run as the reactor's periodic callback: drain the
/// session log queue to the active sink, then report throughput (or
/// idleness) to the supervising process. Supervisor delivery is advisory;
/// nothing here may fail the reactor.
pub fn tick(ctx: &mut DaemonContext) {
    drain_logs(ctx);

    let Some(session) = ctx.session.as_ref() else {
        return;
    };
    let text = status_text(&ctx.formatters, session.transfer_totals());
    ctx.notify.status(&text);
}

/// Drain all queued session log messages in arrival order to the active
/// sink, honoring the current level filter, flushing once per batch.
pub fn drain_logs(ctx: &mut DaemonContext) {
    let Some(session) = ctx.session.as_ref() else {
        return;
    };
    let queue = session.log_queue();
    let messages: Vec<_> = queue
        .drain()
        .into_iter()
        .filter(|message| message.level <= ctx.log_level)
        .collect();
    if let Err(err) = ctx.sink.write_batch(&messages) {
        warn!(%err, "log sink write failed, {} messages dropped", messages.len());
    }
}

/// Render the supervisor status line for the given totals.
#[must_use]
pub fn status_text(formatters: &Formatters, totals: TransferTotals) -> String {
    if totals.upload_bps < IDLE_THRESHOLD && totals.download_bps < IDLE_THRESHOLD {
        "Idle".to_owned()
    } else {
        format!(
            "Up: {}, Down: {}",
            formatters.speed(totals.upload_bps),
            formatters.speed(totals.download_bps)
        )
    }
}
