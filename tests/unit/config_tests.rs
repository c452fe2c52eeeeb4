use std::path::PathBuf;

use swarmd::config::{self, CliOverrides, DaemonConfig, SessionSettings};
use swarmd::logsink::LogLevel;
use swarmd::DaemonError;

fn sample_toml() -> &'static str {
    r#"
download-dir = "dl"
watch-dir = "incoming"
watch-dir-enabled = true
trash-watch-files = true
control-interface-enabled = false
peer-port = 0
blocklist-enabled = true
log-level = "debug"
"#
}

#[test]
fn missing_settings_file_yields_defaults() {
    let temp = tempfile::tempdir().expect("tempdir");
    let settings = config::load_settings(temp.path()).expect("defaults");
    assert_eq!(settings, SessionSettings::default());
    assert!(settings.control_interface_enabled);
    assert!(!settings.watch_dir_enabled);
}

#[test]
fn parses_persisted_settings() {
    let temp = tempfile::tempdir().expect("tempdir");
    std::fs::write(config::settings_path(temp.path()), sample_toml()).expect("write");

    let settings = config::load_settings(temp.path()).expect("parse");
    assert_eq!(settings.download_dir, PathBuf::from("dl"));
    assert_eq!(settings.watch_dir.as_deref(), Some(std::path::Path::new("incoming")));
    assert!(settings.watch_dir_enabled);
    assert!(settings.trash_watch_files);
    assert!(!settings.control_interface_enabled);
    assert!(settings.blocklist_enabled);
    assert_eq!(settings.log_level, "debug");
}

#[test]
fn invalid_settings_file_is_an_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    std::fs::write(config::settings_path(temp.path()), "peer-port = \"nope\"").expect("write");

    let err = config::load_settings(temp.path()).expect_err("must fail");
    assert!(matches!(err, DaemonError::Settings(_)), "got {err}");
}

#[test]
fn cli_overrides_win_over_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config_dir = temp.path().join("config");
    std::fs::create_dir_all(&config_dir).expect("mkdir");
    std::fs::write(config::settings_path(&config_dir), sample_toml()).expect("write");

    let overrides = CliOverrides {
        watch_dir: Some(temp.path().join("cli-watch")),
        download_dir: Some(temp.path().join("cli-dl")),
        log_level: Some("trace".into()),
        ..CliOverrides::default()
    };
    let config = DaemonConfig::build(config_dir, overrides).expect("build");

    assert_eq!(config.settings.watch_dir, Some(temp.path().join("cli-watch")));
    assert_eq!(config.settings.download_dir, temp.path().join("cli-dl"));
    assert_eq!(config.log_level, LogLevel::Trace);
    // File-only fields survive the overlay.
    assert!(config.settings.trash_watch_files);
}

#[test]
fn unparsable_log_level_falls_back_to_info() {
    let temp = tempfile::tempdir().expect("tempdir");
    let overrides = CliOverrides {
        log_level: Some("chatty".into()),
        ..CliOverrides::default()
    };
    let config = DaemonConfig::build(temp.path().join("c"), overrides).expect("build");
    assert_eq!(config.log_level, LogLevel::Info);
}

#[test]
fn watch_dir_requires_enabled_and_non_empty() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut config =
        DaemonConfig::build(temp.path().join("c"), CliOverrides::default()).expect("build");

    assert_eq!(config.watch_dir(), None, "defaults have no watch dir");

    config.settings.watch_dir = Some(PathBuf::from("incoming"));
    assert_eq!(config.watch_dir(), None, "disabled flag gates the path");

    config.settings.watch_dir_enabled = true;
    assert_eq!(
        config.watch_dir(),
        Some(std::path::Path::new("incoming")),
        "enabled and non-empty"
    );

    config.settings.watch_dir = Some(PathBuf::new());
    assert_eq!(config.watch_dir(), None, "empty path is treated as unset");
}

#[test]
fn settings_round_trip() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut settings = SessionSettings::default();
    settings.peer_port = 9091;
    settings.watch_dir = Some(PathBuf::from("w"));
    settings.log_level = "warn".into();

    config::save_settings(temp.path(), &settings).expect("save");
    let reloaded = config::load_settings(temp.path()).expect("load");
    assert_eq!(settings, reloaded);
}

#[test]
fn build_creates_config_dir() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config_dir = temp.path().join("nested").join("config");
    let config = DaemonConfig::build(config_dir.clone(), CliOverrides::default()).expect("build");
    assert!(config_dir.is_dir());
    assert_eq!(config.settings_path(), config_dir.join("settings.toml"));
}
