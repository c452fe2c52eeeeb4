//! Built-in local session: descriptor registry, store restore, and the
//! paused startup flag.

use swarmd::config::CliOverrides;
use swarmd::session::{Descriptor, LocalSession, ShareSession};
use swarmd::DaemonError;

use super::test_helpers::{test_config, test_config_with};

fn descriptor(name: &str) -> Descriptor {
    Descriptor {
        name: name.into(),
        source: format!("https://example.net/{name}"),
        delete_source: None,
    }
}

#[test]
fn paused_flag_comes_from_the_configuration() {
    let temp = tempfile::tempdir().expect("tempdir");

    let config = test_config_with(
        temp.path(),
        CliOverrides {
            paused: true,
            ..CliOverrides::default()
        },
    );
    let session = LocalSession::open(&config).expect("session");
    assert!(session.is_paused());

    let default_config = test_config(&temp.path().join("other"));
    let session = LocalSession::open(&default_config).expect("session");
    assert!(!session.is_paused());
}

#[test]
fn descriptor_registry_counts_and_rejects_duplicates() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = test_config(temp.path());
    let mut session = LocalSession::open(&config).expect("session");
    assert_eq!(session.descriptor_count(), 0);

    session.add_descriptor(descriptor("one")).expect("add");
    session.add_descriptor(descriptor("two")).expect("add");
    assert_eq!(session.descriptor_count(), 2);

    let err = session
        .add_descriptor(descriptor("one"))
        .expect_err("duplicate");
    assert!(matches!(err, DaemonError::Session(_)), "got {err}");
    assert_eq!(session.descriptor_count(), 2, "rejected add changes nothing");
}

#[test]
fn stored_work_items_survive_into_a_new_session() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = test_config(temp.path());

    let mut session = LocalSession::open(&config).expect("session");
    session.add_descriptor(descriptor("one")).expect("add");
    session.add_descriptor(descriptor("two")).expect("add");
    drop(session);

    let mut reopened = LocalSession::open(&config).expect("session");
    assert_eq!(reopened.load_stored_work_items().expect("restore"), 2);
    assert_eq!(reopened.descriptor_count(), 2);

    // Already-registered items are not restored twice.
    assert_eq!(reopened.load_stored_work_items().expect("restore"), 0);
    assert_eq!(reopened.descriptor_count(), 2);
}
