use swarmd::DaemonError;

#[test]
fn display_prefixes_by_domain() {
    let cases = [
        (DaemonError::Config("bad".into()), "config: bad"),
        (DaemonError::Settings("bad".into()), "settings: bad"),
        (DaemonError::Reactor("bad".into()), "reactor: bad"),
        (DaemonError::Watch("bad".into()), "watch: bad"),
        (DaemonError::Session("bad".into()), "session: bad"),
        (DaemonError::Pidfile("bad".into()), "pidfile: bad"),
        (DaemonError::LogSink("bad".into()), "log sink: bad"),
        (DaemonError::Io("bad".into()), "io: bad"),
    ];
    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn converts_toml_errors_to_settings() {
    let parse_err = toml::from_str::<toml::Value>("= broken").expect_err("invalid toml");
    let err: DaemonError = parse_err.into();
    assert!(matches!(err, DaemonError::Settings(_)));
}

#[test]
fn converts_io_errors() {
    let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let err: DaemonError = io_err.into();
    assert!(matches!(err, DaemonError::Io(_)));
    assert!(err.to_string().contains("denied"));
}
