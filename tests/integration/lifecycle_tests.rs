//! Ordered startup and shutdown, pidfile conflict handling, and the
//! deferred-reload hand-off.

use swarmd::config::{CliOverrides, DaemonConfig, SessionSettings};
use swarmd::lifecycle::{LifecycleState, SessionLifecycle};
use swarmd::reload;
use swarmd::session::{LocalSession, ShareSession};

use super::test_helpers::{test_config, test_config_with};

fn lifecycle_config(root: &std::path::Path, overrides: CliOverrides) -> DaemonConfig {
    test_config_with(
        root,
        CliOverrides {
            foreground: true,
            ..overrides
        },
    )
}

#[tokio::test]
async fn stop_before_run_walks_the_full_lifecycle() {
    let temp = tempfile::tempdir().expect("tempdir");
    let pid_path = temp.path().join("swarmd.pid");
    let config = lifecycle_config(
        temp.path(),
        CliOverrides {
            pid_file: Some(pid_path.clone()),
            ..CliOverrides::default()
        },
    );
    let settings_path = config.settings_path();

    let mut lifecycle = SessionLifecycle::new(config).expect("lifecycle");
    assert_eq!(lifecycle.state(), LifecycleState::Created);

    lifecycle.handle().request_stop();
    let code = lifecycle.run().await;

    assert_eq!(code, 0);
    assert_eq!(lifecycle.state(), LifecycleState::Stopped);
    assert!(!pid_path.exists(), "pidfile removed at shutdown");
    assert!(settings_path.exists(), "effective settings persisted");
}

#[tokio::test]
async fn startup_failure_still_runs_ordered_shutdown() {
    let temp = tempfile::tempdir().expect("tempdir");
    let blocker = temp.path().join("blocker");
    std::fs::write(&blocker, "not a directory").expect("write blocker");

    let pid_path = temp.path().join("swarmd.pid");
    let config = lifecycle_config(
        temp.path(),
        CliOverrides {
            // Forces the watch dir create to fail mid-startup, after the
            // pidfile step already ran.
            watch_dir: Some(blocker.join("watch")),
            pid_file: Some(pid_path.clone()),
            ..CliOverrides::default()
        },
    );

    let mut lifecycle = SessionLifecycle::new(config).expect("lifecycle");
    let code = lifecycle.run().await;

    assert_eq!(code, 1);
    assert_eq!(lifecycle.state(), LifecycleState::Stopped);
    assert!(!pid_path.exists(), "shutdown removed the pidfile it created");
}

#[tokio::test]
async fn refuses_to_start_over_a_live_pidfile() {
    let temp = tempfile::tempdir().expect("tempdir");
    let pid_path = temp.path().join("swarmd.pid");
    // Pid 1 is always alive.
    std::fs::write(&pid_path, "1").expect("write pidfile");

    let config = lifecycle_config(
        temp.path(),
        CliOverrides {
            pid_file: Some(pid_path.clone()),
            ..CliOverrides::default()
        },
    );
    let mut lifecycle = SessionLifecycle::new(config).expect("lifecycle");
    let code = lifecycle.run().await;

    assert_eq!(code, 1);
    assert_eq!(lifecycle.state(), LifecycleState::Stopped);
    assert_eq!(
        std::fs::read_to_string(&pid_path).expect("read"),
        "1",
        "the other daemon's pidfile is left untouched"
    );
}

#[tokio::test]
async fn stale_pidfile_is_claimed_and_removed() {
    let temp = tempfile::tempdir().expect("tempdir");
    let pid_path = temp.path().join("swarmd.pid");
    std::fs::write(&pid_path, "4294967295").expect("write pidfile");

    let config = lifecycle_config(
        temp.path(),
        CliOverrides {
            pid_file: Some(pid_path.clone()),
            ..CliOverrides::default()
        },
    );
    let mut lifecycle = SessionLifecycle::new(config).expect("lifecycle");
    lifecycle.handle().request_stop();
    let code = lifecycle.run().await;

    assert_eq!(code, 0, "a stale pidfile does not block startup");
    assert!(!pid_path.exists(), "claimed pidfile removed at shutdown");
}

#[tokio::test]
async fn engine_close_announcement_stops_the_daemon() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = lifecycle_config(temp.path(), CliOverrides::default());
    let mut lifecycle = SessionLifecycle::new(config).expect("lifecycle");

    // A stand-in engine wired the way the lifecycle wires its own session:
    // its close announcement fires the registered callback, which must be
    // indistinguishable from an external stop request.
    let engine_config = test_config(&temp.path().join("engine"));
    let mut engine = LocalSession::open(&engine_config).expect("engine");
    let stop_handle = lifecycle.handle();
    engine.set_close_callback(Box::new(move || stop_handle.request_stop()));

    lifecycle.handle().post(move |_ctx| engine.announce_closing());

    let code = lifecycle.run().await;
    assert_eq!(code, 0);
    assert_eq!(lifecycle.state(), LifecycleState::Stopped);
}

#[tokio::test]
async fn reload_requested_before_startup_is_applied_during_startup() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config_dir = temp.path().join("config");
    std::fs::create_dir_all(&config_dir).expect("config dir");

    // Persisted settings disable the control interface; the deferred reload
    // must force it back on before the daemon reports ready.
    let mut settings = SessionSettings::default();
    settings.control_interface_enabled = false;
    swarmd::config::save_settings(&config_dir, &settings).expect("save");

    let config = DaemonConfig::build(
        config_dir.clone(),
        CliOverrides {
            foreground: true,
            ..CliOverrides::default()
        },
    )
    .expect("config");
    assert!(!config.settings.control_interface_enabled);

    let mut lifecycle = SessionLifecycle::new(config).expect("lifecycle");
    reload::request_reload(lifecycle.context_mut());
    assert!(lifecycle.context().reload_deferred);

    lifecycle.handle().request_stop();
    let code = lifecycle.run().await;
    assert_eq!(code, 0);
    assert!(!lifecycle.context().reload_deferred);

    // Shutdown persists the live session's settings, which carry the
    // reload's forced override.
    let persisted = swarmd::config::load_settings(&config_dir).expect("load");
    assert!(persisted.control_interface_enabled);
}
