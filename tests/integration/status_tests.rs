//! Status ticks against a live context and a listening supervisor socket.

use serial_test::serial;
use swarmd::session::{LocalSession, TransferTotals};
use swarmd::status;
use swarmd::supervisor::NotifyHandle;

use super::test_helpers::{test_config, test_context};

#[cfg(unix)]
fn notify_pair(dir: &std::path::Path) -> (std::os::unix::net::UnixDatagram, NotifyHandle) {
    let socket_path = dir.join("notify.sock");
    let supervisor = std::os::unix::net::UnixDatagram::bind(&socket_path).expect("bind");
    std::env::set_var("NOTIFY_SOCKET", &socket_path);
    let handle = NotifyHandle::from_env();
    std::env::remove_var("NOTIFY_SOCKET");
    assert!(handle.is_enabled());
    (supervisor, handle)
}

#[cfg(unix)]
fn recv_payload(supervisor: &std::os::unix::net::UnixDatagram) -> String {
    let mut buf = [0u8; 256];
    let len = supervisor.recv(&mut buf).expect("recv");
    std::str::from_utf8(&buf[..len]).expect("utf8").to_owned()
}

#[cfg(unix)]
#[test]
#[serial]
fn tick_reports_rates_above_the_idle_threshold() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (supervisor, notify) = notify_pair(temp.path());

    let (_reactor, mut ctx) = test_context(test_config(temp.path()));
    ctx.notify = notify;

    let mut session = LocalSession::open(&ctx.config).expect("session");
    session.set_transfer_totals(TransferTotals {
        upload_bps: 125_000.0,
        download_bps: 2_048_000.0,
    });
    ctx.session = Some(Box::new(session));

    status::tick(&mut ctx);
    assert_eq!(
        recv_payload(&supervisor),
        "STATUS=Up: 125.0 kB/s, Down: 2.0 MB/s"
    );
}

#[cfg(unix)]
#[test]
#[serial]
fn tick_reports_idle_for_a_quiet_session() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (supervisor, notify) = notify_pair(temp.path());

    let (_reactor, mut ctx) = test_context(test_config(temp.path()));
    ctx.notify = notify;

    status::tick(&mut ctx);
    assert_eq!(recv_payload(&supervisor), "STATUS=Idle");
}

#[test]
fn tick_without_a_session_is_a_noop() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (_reactor, mut ctx) = test_context(test_config(temp.path()));
    ctx.session = None;
    // No session: nothing to drain or report, and nothing panics.
    status::tick(&mut ctx);
}
