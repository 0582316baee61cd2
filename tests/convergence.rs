mod common;

use grenml_collation::{import::ImportStatus, properties::ElementKind};
use test_log::test;

fn populated() -> grenml_collation::session::CollationSession {
    let mut session = common::session();
    let log = session.import(&common::backbone(), None);
    assert_eq!(log.status(), ImportStatus::Completed, "{log}");
    let t1 = session.store.topology_by_grenml_id("t1").unwrap().key;
    let log = session.import(&common::regional(), Some(t1));
    assert_eq!(log.status(), ImportStatus::Completed, "{log}");
    session
}

#[test]
fn test_export_marks_external_references() {
    common::init_logging();
    let session = populated();
    let exported = session.export(None).unwrap();
    assert_eq!(exported.id, "t1");
    let regional = exported.find("t2").unwrap();
    assert_eq!(regional.primary_owner.as_deref(), Some("i2"));

    let n1 = regional.node("n1").unwrap();
    assert_eq!(n1.properties.get("!-from_topology"), Some(&vec!["t1".to_string()]));
    let i1 = regional.institution("i1").unwrap();
    assert_eq!(i1.properties.get("!-from_topology"), Some(&vec!["t1".to_string()]));
    assert!(exported.validate().is_empty());
}

#[test]
fn test_reimporting_an_export_converges() {
    let mut session = populated();
    let first = session.export(None).unwrap();
    let counts: Vec<usize> = ElementKind::all()
        .iter()
        .map(|kind| session.store.len(*kind))
        .collect();

    for _ in 0..3 {
        let log = session.import(&first, None);
        assert_eq!(log.status(), ImportStatus::Completed, "{log}");
        let again = session.export(None).unwrap();
        assert_eq!(common::normalized(&again), common::normalized(&first));
    }

    let after: Vec<usize> = ElementKind::all()
        .iter()
        .map(|kind| session.store.len(*kind))
        .collect();
    assert_eq!(after, counts);
    assert!(session.store.built_in_test().is_empty());
}

#[test]
fn test_export_imports_cleanly_elsewhere() {
    let session = populated();
    let exported = session.export(None).unwrap();

    let mut fresh = common::session();
    let log = fresh.import(&exported, None);
    assert_eq!(log.status(), ImportStatus::Completed, "{log}");
    assert_eq!(fresh.store.len(ElementKind::Institution), 2);
    assert_eq!(fresh.store.len(ElementKind::Node), 3);
    assert_eq!(fresh.store.len(ElementKind::Link), 2);
    assert_eq!(
        common::normalized(&fresh.export(None).unwrap()),
        common::normalized(&exported)
    );
}
