use swarmd::session::TransferTotals;
use swarmd::status::{status_text, IDLE_THRESHOLD, TICK_INTERVAL};
use swarmd::units::Formatters;

#[test]
fn tick_interval_is_one_second() {
    assert_eq!(TICK_INTERVAL, std::time::Duration::from_secs(1));
}

#[test]
fn idle_below_threshold_in_both_directions() {
    let formatters = Formatters::si();
    let totals = TransferTotals {
        upload_bps: 0.0,
        download_bps: 0.0,
    };
    assert_eq!(status_text(&formatters, totals), "Idle");

    let barely = TransferTotals {
        upload_bps: IDLE_THRESHOLD / 2.0,
        download_bps: IDLE_THRESHOLD / 2.0,
    };
    assert_eq!(status_text(&formatters, barely), "Idle");
}

#[test]
fn one_active_direction_is_not_idle() {
    let formatters = Formatters::si();
    let totals = TransferTotals {
        upload_bps: 0.0,
        download_bps: 2048.0,
    };
    let text = status_text(&formatters, totals);
    assert_eq!(text, "Up: 0 B/s, Down: 2.0 kB/s");
}

#[test]
fn reports_two_non_negative_rates() {
    let formatters = Formatters::si();
    let totals = TransferTotals {
        upload_bps: 1_500_000.0,
        download_bps: 250.0,
    };
    assert_eq!(
        status_text(&formatters, totals),
        "Up: 1.5 MB/s, Down: 250 B/s"
    );
}
