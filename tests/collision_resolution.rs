mod common;

use grenml_collation::{
    collation::{
        Action, ActionType, MatchCriterion, MatchType, Rule, RuleStatus, Ruleset,
    },
    import::{ParsedInstitution, ParsedNode, ParsedTopology},
    properties::{ElementKind, ElementRef},
};
use test_log::test;

#[test]
fn test_institution_imported_twice_keeps_newest_with_union_of_elements() {
    common::init_logging();
    let mut session = common::session();
    session.config.apply_rules_on_import = false;

    let first = common::backbone();
    let mut second = ParsedTopology::new("t2", "Second Backbone");
    second.primary_owner = Some("i1".to_string());
    second.institutions.push(ParsedInstitution::new("i1", "Institution One (again)"));
    second.nodes.push(ParsedNode::new("n9", "Node Nine", &["i1"]));
    session.import(&first, None);
    session.import(&second, None);
    assert_eq!(session.store.len(ElementKind::Institution), 2);

    let report = session.rules.apply_all(&mut session.store);
    assert_eq!(report.count(RuleStatus::Succeeded), report.rules.len());

    let survivors = session.store.with_grenml_id(ElementKind::Institution, "i1");
    assert_eq!(survivors.len(), 1);
    let survivor = survivors[0];
    let institution = session.store.institution(survivor).unwrap();
    assert_eq!(institution.base.name, "Institution One (again)");
    assert_eq!(institution.base.topologies.len(), 2);

    let (nodes, links) = session.store.owned_elements(survivor);
    assert_eq!(nodes.len(), 3);
    assert_eq!(links.len(), 1);
    assert_eq!(session.store.owned_topologies(survivor).len(), 2);
}

#[test]
fn test_keep_newest_is_idempotent() {
    let mut session = common::session();
    session.config.apply_rules_on_import = false;
    let mut other = common::backbone();
    other.id = "t2".to_string();
    other.name = "Mirror".to_string();
    session.import(&common::backbone(), None);
    session.import(&other, None);

    session.rules.apply_all(&mut session.store);
    let once = session.store.clone();
    session.rules.apply_all(&mut session.store);
    assert_eq!(session.store, once);
    assert!(session.store.built_in_test().is_empty());
}

#[test]
fn test_custom_rule_runs_before_defaults() {
    let mut session = common::session();
    session.config.apply_rules_on_import = false;
    session.import(&common::backbone(), None);

    let custom = session
        .rules
        .ruleset_by_name("Custom ID Collision Resolution")
        .unwrap()
        .id;
    session
        .rules
        .add_rule(
            custom,
            Rule::new("Drop Node Two")
                .with_criterion(
                    MatchCriterion::new(MatchType::ById(ElementKind::Node)).with_info("ID", "n2"),
                )
                .with_action(Action::new(ActionType::Delete(ElementKind::Node))),
        )
        .unwrap();

    let report = session.rules.apply_all(&mut session.store);
    assert_eq!(report.rules[0].rule_name, "Drop Node Two");
    assert!(session
        .store
        .with_grenml_id(ElementKind::Node, "n2")
        .is_empty());
    // The Link ending at n2 went with it.
    assert_eq!(session.store.links().count(), 0);
}

#[test]
fn test_misconfigured_ruleset_reports_not_run() {
    let mut session = common::session();
    session.import(&common::backbone(), None);
    let id = session
        .rules
        .insert_ruleset(Ruleset::new("Broken").with_rule(Rule::new("Empty")))
        .unwrap();
    let report = session.rules.apply_ruleset(&mut session.store, id).unwrap();
    assert_eq!(report.count(RuleStatus::ValidationFailed), 1);
    assert!(!session.rules.ruleset_status(id).unwrap().ready);
    assert!(session
        .store
        .contains(ElementRef::node(session.store.keys(ElementKind::Node)[0])));
}
