use swarmd::supervisor::{pidfile_live_pid, remove_pidfile, write_pidfile};

#[test]
fn write_records_decimal_pid() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("swarmd.pid");

    write_pidfile(&path).expect("write");
    let contents = std::fs::read_to_string(&path).expect("read");
    let pid: u32 = contents.trim().parse().expect("decimal pid");
    assert_eq!(pid, std::process::id());
}

#[test]
fn write_truncates_previous_contents() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("swarmd.pid");
    std::fs::write(&path, "99999999 leftover garbage with trailing text").expect("seed");

    write_pidfile(&path).expect("write");
    let contents = std::fs::read_to_string(&path).expect("read");
    assert_eq!(contents.trim(), std::process::id().to_string());
}

#[test]
fn remove_tolerates_missing_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    remove_pidfile(&temp.path().join("never-created.pid"));
}

#[test]
fn remove_deletes_the_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("swarmd.pid");
    write_pidfile(&path).expect("write");
    remove_pidfile(&path);
    assert!(!path.exists());
}

#[test]
fn live_pid_ignores_missing_and_malformed_files() {
    let temp = tempfile::tempdir().expect("tempdir");
    assert_eq!(pidfile_live_pid(&temp.path().join("absent.pid")), None);

    let malformed = temp.path().join("malformed.pid");
    std::fs::write(&malformed, "not-a-pid\n").expect("write");
    assert_eq!(pidfile_live_pid(&malformed), None);
}

#[test]
fn live_pid_ignores_own_pid() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("own.pid");
    std::fs::write(&path, format!("{}\n", std::process::id())).expect("write");
    assert_eq!(pidfile_live_pid(&path), None, "own pid is never a conflict");
}

#[cfg(unix)]
#[test]
fn live_pid_treats_impossible_pid_as_stale() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("stale.pid");
    std::fs::write(&path, format!("{}\n", u32::MAX)).expect("write");
    assert_eq!(pidfile_live_pid(&path), None);
}

#[cfg(unix)]
#[test]
fn live_pid_detects_a_running_process() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("live.pid");
    // pid 1 always exists on unix.
    std::fs::write(&path, "1\n").expect("write");
    assert_eq!(pidfile_live_pid(&path), Some(1));
}
