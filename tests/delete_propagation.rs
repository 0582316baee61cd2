mod common;

use grenml_collation::{
    import::{ImportStatus, ParsedNode},
    properties::{ElementKind, ElementRef},
};
use test_log::test;

#[test]
fn test_reimport_without_element_deletes_it() {
    common::init_logging();
    let mut session = common::session();
    session.import(&common::backbone(), None);

    let mut trimmed = common::backbone();
    trimmed.links.clear();
    trimmed.nodes.retain(|n| n.id == "n1");
    let log = session.import(&trimmed, None);
    assert_eq!(log.status(), ImportStatus::Completed, "{log}");

    assert_eq!(session.store.len(ElementKind::Node), 1);
    assert_eq!(session.store.len(ElementKind::Link), 0);
    assert_eq!(session.store.len(ElementKind::Institution), 1);
    assert!(session.store.built_in_test().is_empty());
}

#[test]
fn test_element_in_surviving_topology_is_kept() {
    let mut session = common::session();
    session.import(&common::backbone(), None);

    // The regional document lists n1 as its own, so the default Rules merge the two copies.
    let mut regional = common::regional();
    for node in regional.nodes.iter_mut() {
        node.properties.clear();
    }
    session.import(&regional, None);
    let n1 = session.store.with_grenml_id(ElementKind::Node, "n1");
    assert_eq!(n1.len(), 1);
    assert_eq!(session.store.node(n1[0]).unwrap().base.topologies.len(), 2);

    let mut trimmed = common::backbone();
    trimmed.links.clear();
    trimmed.nodes.retain(|n| n.id == "n2");
    session.import(&trimmed, None);

    // n1 left the backbone but stays for the regional Link.
    let n1 = session.store.with_grenml_id(ElementKind::Node, "n1");
    assert_eq!(n1.len(), 1);
    let t2 = session.store.topology_by_grenml_id("t2").unwrap().key;
    assert_eq!(
        session.store.node(n1[0]).unwrap().base.topologies.iter().copied().collect::<Vec<_>>(),
        vec![t2]
    );
    let l2 = session.store.with_grenml_id(ElementKind::Link, "l2")[0];
    assert!(session.store.link(l2).unwrap().touches(n1[0]));
    assert!(session.store.with_grenml_id(ElementKind::Link, "l1").is_empty());
    assert!(session.store.built_in_test().is_empty());
}

#[test]
fn test_changed_element_is_replaced_in_place() {
    let mut session = common::session();
    session.import(&common::backbone(), None);
    let old_owner = session.store.with_grenml_id(ElementKind::Institution, "i1")[0];

    let mut renamed = common::backbone();
    renamed.nodes[0] = ParsedNode::new("n1", "Node One (moved)", &["i1"]);
    session.import(&renamed, None);

    let n1 = session.store.with_grenml_id(ElementKind::Node, "n1");
    assert_eq!(n1.len(), 1);
    assert_eq!(session.store.node(n1[0]).unwrap().base.name, "Node One (moved)");
    assert!(!session.store.contains(ElementRef::institution(old_owner)));
    let links: Vec<_> = session.store.links_of_node(n1[0]);
    assert_eq!(links.len(), 1);
}
