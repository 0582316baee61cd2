use super::*;
use crate::{
    collation::{
        defaults::{CUSTOM_RULESET_NAME, DEFAULT_RULESET_NAME},
        engine::validate_input,
        match_types::{ID_KEY, TOPOLOGY_ID_KEY},
    },
    error::CollationError,
    properties::{ElementKind, ElementRef, Institution, Link, Node, Property, SeqKey, Topology},
    store::TopologyStore,
};
use test_log::test;

struct Fixture {
    store: TopologyStore,
    topology: SeqKey,
}

impl Fixture {
    fn new() -> Self {
        let mut store = TopologyStore::new();
        let topology = store
            .save_topology(Topology::new("topo-1", "Backbone"))
            .unwrap();
        Fixture { store, topology }
    }

    fn topology(&mut self, id: &str) -> SeqKey {
        self.store.save_topology(Topology::new(id, id)).unwrap()
    }

    fn institution_in(&mut self, id: &str, name: &str, topology: SeqKey) -> SeqKey {
        let mut inst = Institution::new(id, name);
        inst.base.topologies.insert(topology);
        self.store.insert_institution(inst).unwrap()
    }

    fn institution(&mut self, id: &str, name: &str) -> SeqKey {
        self.institution_in(id, name, self.topology)
    }

    fn node_in(&mut self, id: &str, name: &str, topology: SeqKey) -> SeqKey {
        let mut node = Node::new(id, name);
        node.base.topologies.insert(topology);
        self.store.insert_node(node).unwrap()
    }

    fn node(&mut self, id: &str, name: &str) -> SeqKey {
        self.node_in(id, name, self.topology)
    }

    fn link(&mut self, id: &str, a: SeqKey, b: SeqKey) -> SeqKey {
        let mut link = Link::new(id, id, a, b);
        link.base.topologies.insert(self.topology);
        self.store.insert_link(link).unwrap()
    }

    fn add_property(&mut self, element: ElementRef, name: &str, value: &str) {
        self.store
            .add_property(element, Property::new(name, value))
            .unwrap();
    }

    fn properties(&self, element: ElementRef) -> Vec<(String, String)> {
        let mut props: Vec<(String, String)> = self
            .store
            .element(element)
            .unwrap()
            .properties
            .iter()
            .map(|p| (p.name.clone(), p.value.clone()))
            .collect();
        props.sort();
        props
    }
}

fn by_id(kind: ElementKind, id: &str) -> MatchCriterion {
    MatchCriterion::new(MatchType::ById(kind)).with_info(ID_KEY, id)
}

fn run(store: &mut TopologyStore, rule: Rule) -> RuleReport {
    let mut book = RuleBook::new();
    let ruleset = book.insert_ruleset(Ruleset::new("test").with_rule(rule)).unwrap();
    let report = book.apply_ruleset(store, ruleset).unwrap();
    assert_eq!(report.rules.len(), 1);
    report.rules.into_iter().next().unwrap()
}

// ------------------------------------------------------------------------------------------------
// Registries and validation
// ------------------------------------------------------------------------------------------------

#[test]
fn test_type_names_round_trip_through_registry() {
    assert_eq!(
        MatchType::from_name("Match Duplicate Nodes"),
        Some(MatchType::ByIdDuplicate(ElementKind::Node))
    );
    assert_eq!(
        MatchType::from_name("Match Institutions by Topology"),
        Some(MatchType::ByTopology(ElementKind::Institution))
    );
    assert_eq!(
        ActionType::from_name("Merge into Link"),
        Some(ActionType::MergeInto(ElementKind::Link))
    );
    assert_eq!(
        ActionType::from_name("Delete Node Tag Property"),
        Some(ActionType::DeleteTagProperty(ElementKind::Node))
    );
    assert_eq!(ActionType::from_name("Teleport Node"), None);
    assert_eq!(ActionType::from_name("Delete Institution Tag Property"), None);
    assert_eq!(match_types::MATCH_TYPES.len(), 9);
    assert_eq!(action_types::ACTION_TYPES.len(), 17);
}

#[test]
fn test_institution_tag_property_delete_is_rejected() {
    let rule = Rule::new("strip tags")
        .with_criterion(by_id(ElementKind::Institution, "i1"))
        .with_action(
            Action::new(ActionType::DeleteTagProperty(ElementKind::Institution))
                .with_info("value", "core"),
        );
    assert!(matches!(
        validate_rule(&rule),
        Err(CollationError::UnsupportedActionType { .. })
    ));
    let parsed: Result<ActionType, _> =
        serde_json::from_value(serde_json::json!("Delete Institution Tag Property"));
    assert!(parsed.is_err());
}

#[test]
fn test_validate_input_counts_keys() {
    let infos = vec![Info::new("ID", "a")];
    assert!(validate_input(&["ID"], &["Topology ID"], &infos));
    let dup = vec![Info::new("ID", "a"), Info::new("ID", "b")];
    assert!(!validate_input(&["ID"], &[], &dup));
    let extra = vec![Info::new("ID", "a"), Info::new("colour", "red")];
    assert!(!validate_input(&["ID"], &["Topology ID"], &extra));
    assert!(!validate_input(&["ID"], &[], &[]));
    assert!(validate_input(&[], &[], &[]));
}

#[test]
fn test_validate_rule_reports_each_misconfiguration() {
    let empty = Rule::new("empty");
    assert!(matches!(
        validate_rule(&empty),
        Err(CollationError::NoMatchCriteria(_))
    ));

    let no_actions = Rule::new("no actions").with_criterion(by_id(ElementKind::Node, "n1"));
    assert!(matches!(
        validate_rule(&no_actions),
        Err(CollationError::NoActions(_))
    ));

    let mixed = Rule::new("mixed")
        .with_criterion(by_id(ElementKind::Node, "n1"))
        .with_action(Action::new(ActionType::Delete(ElementKind::Link)));
    assert!(matches!(
        validate_rule(&mixed),
        Err(CollationError::ConflictingElementKinds(_))
    ));

    let missing_info = Rule::new("missing info")
        .with_criterion(MatchCriterion::new(MatchType::ById(ElementKind::Node)))
        .with_action(Action::new(ActionType::Delete(ElementKind::Node)));
    let err = validate_rule(&missing_info).unwrap_err();
    assert!(err.is_validation());
    assert!(err.to_string().contains("exactly one Match Info"));

    let bad_action = Rule::new("bad action")
        .with_criterion(by_id(ElementKind::Node, "n1"))
        .with_action(Action::new(ActionType::MergeInto(ElementKind::Node)));
    assert!(matches!(
        validate_rule(&bad_action),
        Err(CollationError::IncorrectActionInfos { .. })
    ));

    let good = Rule::new("good")
        .with_criterion(by_id(ElementKind::Node, "n1"))
        .with_action(
            Action::new(ActionType::MergeInto(ElementKind::Node))
                .with_info(ID_KEY, "n2")
                .with_info(TOPOLOGY_ID_KEY, "topo-1"),
        );
    assert_eq!(validate_rule(&good).unwrap(), ElementKind::Node);
}

// ------------------------------------------------------------------------------------------------
// Match predicates
// ------------------------------------------------------------------------------------------------

#[test]
fn test_match_by_topology_and_duplicates() {
    let mut f = Fixture::new();
    let other = f.topology("topo-2");
    let a = f.node("n1", "A");
    let b = f.node_in("n1", "B", other);
    let c = f.node_in("n2", "C", other);
    let all = f.store.keys(ElementKind::Node);

    let in_other = MatchType::ByTopology(ElementKind::Node)
        .filter(&f.store, &all, &[Info::new(TOPOLOGY_ID_KEY, "topo-2")])
        .unwrap();
    assert_eq!(in_other, vec![b, c]);

    let unknown = MatchType::ByTopology(ElementKind::Node)
        .filter(&f.store, &all, &[Info::new(TOPOLOGY_ID_KEY, "nope")])
        .unwrap();
    assert!(unknown.is_empty());

    let duplicates = MatchType::ByIdDuplicate(ElementKind::Node)
        .filter(&f.store, &all, &[])
        .unwrap();
    assert_eq!(duplicates, vec![a, b]);

    // Chained: duplicates counted among what is left after the topology filter.
    let chained = MatchType::ByIdDuplicate(ElementKind::Node)
        .filter(&f.store, &in_other, &[])
        .unwrap();
    assert!(chained.is_empty());
}

// ------------------------------------------------------------------------------------------------
// Actions
// ------------------------------------------------------------------------------------------------

#[test]
fn test_keep_newest_institution_collects_ownership() {
    let mut f = Fixture::new();
    let old = f.institution("i1", "Old");
    let new = f.institution("i1", "New");
    let mut owned = Node::new("n1", "Owned");
    owned.owners.insert(old);
    let owned = f.store.insert_node(owned).unwrap();

    let rule = Rule::new("dedup")
        .with_criterion(MatchCriterion::new(MatchType::ByIdDuplicate(
            ElementKind::Institution,
        )))
        .with_action(Action::new(ActionType::KeepNewest(ElementKind::Institution)));
    let report = run(&mut f.store, rule);
    assert_eq!(report.status(), RuleStatus::Succeeded);

    assert!(f.store.institution(old).is_none());
    assert_eq!(f.store.with_grenml_id(ElementKind::Institution, "i1"), vec![new]);
    assert!(f.store.node(owned).unwrap().owners.contains(&new));

    let log = report.log().unwrap();
    assert_eq!(log.matched, vec![old, new]);
    assert_eq!(log.action_logs.len(), 2);
    assert!(log.action_logs[0].message.contains("in favour of newest"));
    assert!(log.action_logs[1].message.contains("is already the newest"));
}

#[test]
fn test_keep_newest_is_idempotent() {
    let mut f = Fixture::new();
    let a = f.node("n1", "A");
    let b = f.node("n1", "B");
    let c = f.node("c", "C");
    f.link("l1", a, c);

    let action = Action::new(ActionType::KeepNewest(ElementKind::Node));
    let (outcome, _) = action
        .action_type
        .apply(&mut f.store, a, &action.infos)
        .unwrap();
    assert_eq!(outcome, ActionOutcome::Continue(b));
    let once = f.store.clone();

    let (outcome, log) = action
        .action_type
        .apply(&mut f.store, b, &action.infos)
        .unwrap();
    assert_eq!(outcome, ActionOutcome::Continue(b));
    assert!(log.succeeded);
    assert_eq!(f.store, once);
}

#[test]
fn test_delete_node_stops_chain_and_takes_links() {
    let mut f = Fixture::new();
    let a = f.node("n1", "A");
    let b = f.node("n2", "B");
    let l = f.link("l1", a, b);

    let rule = Rule::new("delete")
        .with_criterion(by_id(ElementKind::Node, "n1"))
        .with_action(Action::new(ActionType::Delete(ElementKind::Node)))
        .with_action(
            Action::new(ActionType::DeleteProperty(ElementKind::Node))
                .with_info("name", "anything"),
        );
    let report = run(&mut f.store, rule);
    let log = report.log().unwrap();
    assert_eq!(log.action_logs.len(), 1);
    assert!(log.affected().links.contains(&l));
    assert!(f.store.node(a).is_none());
    assert!(f.store.link(l).is_none());
    assert_eq!(
        log.admin_message(),
        "Applied Rule delete successfully. Elements affected: 1 Link(s), 1 Node(s), 0 \
         Institution(s)."
    );
}

#[test]
fn test_delete_property_by_name_value_and_tag() {
    let mut f = Fixture::new();
    let n = f.node("n1", "A");
    let node = ElementRef::node(n);
    f.add_property(node, "tag", "core");
    f.add_property(node, "tag", "edge");
    f.add_property(node, "Speed", "100G");

    let rule = Rule::new("strip")
        .with_criterion(by_id(ElementKind::Node, "n1"))
        .with_action(
            Action::new(ActionType::DeleteTagProperty(ElementKind::Node)).with_info("value", "core"),
        )
        .with_action(Action::new(ActionType::DeleteProperty(ElementKind::Node)).with_info("name", "SPEED"))
        .with_action(
            Action::new(ActionType::DeleteProperty(ElementKind::Node))
                .with_info("name", "tag")
                .with_info("value", "missing"),
        );
    let report = run(&mut f.store, rule);
    let log = report.log().unwrap();
    assert_eq!(log.action_logs.len(), 3);
    assert!(log.action_logs[0].message.starts_with(
        "Delete property with Name=tag and with Value=core at node"
    ));
    assert!(log.action_logs[1].message.starts_with("Delete property with Name=speed at node"));
    assert!(log.action_logs[2]
        .message
        .starts_with("The given property with Name=tag and with Value=missing was not found"));
    assert!(log.action_logs[2].affected.is_empty());
    assert_eq!(f.properties(node), vec![("tag".into(), "edge".into())]);
}

#[test]
fn test_merge_node_fills_fields_properties_and_relations() {
    let mut f = Fixture::new();
    let other = f.topology("topo-2");
    let owner = f.institution("i1", "Owner");
    let source = {
        let mut node = Node::new("n1", "Source");
        node.base.topologies.insert(other);
        node.base.short_name = Some("SRC".into());
        node.owners.insert(owner);
        f.store.insert_node(node).unwrap()
    };
    let target = f.node("n2", "Target");
    let far = f.node("n3", "Far");
    let l = f.link("l1", source, far);
    let (s, t) = (ElementRef::node(source), ElementRef::node(target));
    f.add_property(s, "tag", "core");
    f.add_property(s, "tag", "shared");
    f.add_property(s, "description", "from source");
    f.add_property(s, "vendor", "acme");
    f.add_property(t, "tag", "shared");
    f.add_property(t, "description", "from target");

    let rule = Rule::new("merge")
        .with_criterion(by_id(ElementKind::Node, "n1"))
        .with_action(Action::new(ActionType::MergeInto(ElementKind::Node)).with_info(ID_KEY, "n2"));
    let report = run(&mut f.store, rule);
    assert_eq!(report.status(), RuleStatus::Succeeded);

    assert!(f.store.node(source).is_none());
    let merged = f.store.node(target).unwrap();
    assert_eq!(merged.base.name, "Target");
    assert_eq!(merged.base.short_name.as_deref(), Some("SRC"));
    assert!(merged.owners.contains(&owner));
    assert!(merged.base.topologies.contains(&other));
    assert!(f.store.link(l).unwrap().touches(target));
    assert_eq!(
        f.properties(t),
        vec![
            ("description".into(), "from target".into()),
            ("tag".into(), "core".into()),
            ("tag".into(), "shared".into()),
            ("vendor".into(), "acme".into()),
        ]
    );
    let log = report.log().unwrap();
    assert!(log.action_logs[0].message.starts_with("Merge Node Source"));
    assert!(log.affected().links.contains(&l));
}

#[test]
fn test_merge_aborts_on_ambiguous_or_self_target() {
    let mut f = Fixture::new();
    let other = f.topology("topo-2");
    let source = f.node("n1", "Source");
    f.node("dup", "First");
    let second = f.node_in("dup", "Second", other);

    let merge = |id: &str, topology: Option<&str>| {
        let action = Action::new(ActionType::MergeInto(ElementKind::Node)).with_info(ID_KEY, id);
        match topology {
            Some(t) => action.with_info(TOPOLOGY_ID_KEY, t),
            None => action,
        }
    };

    let (outcome, log) = merge("dup", None)
        .action_type
        .apply(&mut f.store, source, &merge("dup", None).infos)
        .unwrap();
    assert!(matches!(outcome, ActionOutcome::Stopped(StopReason::Aborted(_))));
    assert_eq!(log.message, "Found too many substitute Node elements.");
    assert!(f.store.node(source).is_some());

    let (outcome, log) = merge("n1", None)
        .action_type
        .apply(&mut f.store, source, &merge("n1", None).infos)
        .unwrap();
    assert!(matches!(outcome, ActionOutcome::Stopped(_)));
    assert!(log.message.contains("is both target and replacement/merge_into"));

    let (outcome, log) = merge("dup", Some("missing-topology"))
        .action_type
        .apply(&mut f.store, source, &merge("dup", Some("missing-topology")).infos)
        .unwrap();
    assert!(matches!(outcome, ActionOutcome::Stopped(_)));
    assert_eq!(log.message, "Could not find the substitute Node.");

    let infos = merge("dup", Some("topo-2")).infos;
    let (outcome, _) = ActionType::MergeInto(ElementKind::Node)
        .apply(&mut f.store, source, &infos)
        .unwrap();
    assert_eq!(outcome, ActionOutcome::Continue(second));
}

#[test]
fn test_replace_link_requires_matching_endpoints() {
    let mut f = Fixture::new();
    let a = f.node("a", "A");
    let b = f.node("b", "B");
    let c = f.node("c", "C");
    let d = f.node("d", "D");
    let l1 = f.link("L1", a, b);
    f.link("L2", c, d);
    let l3 = f.link("L3", b, a);

    let replace = |target: &str| {
        Rule::new(&format!("replace with {target}"))
            .with_criterion(by_id(ElementKind::Link, "L1"))
            .with_action(
                Action::new(ActionType::ReplaceWith(ElementKind::Link)).with_info(ID_KEY, target),
            )
    };

    let report = run(&mut f.store, replace("L2"));
    assert_eq!(report.status(), RuleStatus::RanWithFailures);
    let log = report.log().unwrap();
    assert!(log.action_logs[0].message.contains("have different endpoints"));
    assert!(!log.action_logs[0].succeeded);
    assert!(f.store.link(l1).is_some());

    let report = run(&mut f.store, replace("L3"));
    assert_eq!(report.status(), RuleStatus::Succeeded);
    assert!(f.store.link(l1).is_none());
    assert!(f.store.link(l3).is_some());
}

#[test]
fn test_replace_node_discards_source_properties() {
    let mut f = Fixture::new();
    let source = f.node("n1", "Source");
    let target = f.node("n2", "Target");
    f.add_property(ElementRef::node(source), "vendor", "acme");

    let rule = Rule::new("replace")
        .with_criterion(by_id(ElementKind::Node, "n1"))
        .with_action(
            Action::new(ActionType::ReplaceWith(ElementKind::Node)).with_info(ID_KEY, "n2"),
        )
        .with_action(
            Action::new(ActionType::DeleteTagProperty(ElementKind::Node)).with_info("value", "x"),
        );
    let report = run(&mut f.store, rule);
    let log = report.log().unwrap();
    assert_eq!(log.action_logs.len(), 2);
    // The chain continued on the replacement.
    assert_eq!(log.action_logs[1].element, ElementRef::node(target));
    assert!(f.properties(ElementRef::node(target)).is_empty());
}

// ------------------------------------------------------------------------------------------------
// Engine
// ------------------------------------------------------------------------------------------------

#[test]
fn test_invalid_rule_is_skipped_without_stopping_ruleset() {
    let mut f = Fixture::new();
    f.node("n1", "A");
    let mut book = RuleBook::new();
    let ruleset = book
        .insert_ruleset(
            Ruleset::new("mixed")
                .with_rule(Rule::new("broken").with_priority(1))
                .with_rule(
                    Rule::new("works")
                        .with_priority(2)
                        .with_criterion(by_id(ElementKind::Node, "n1"))
                        .with_action(Action::new(ActionType::Delete(ElementKind::Node))),
                ),
        )
        .unwrap();

    let report = book.apply_ruleset(&mut f.store, ruleset).unwrap();
    assert_eq!(report.rules.len(), 2);
    assert_eq!(report.rules[0].status(), RuleStatus::ValidationFailed);
    assert_eq!(report.rules[1].status(), RuleStatus::Succeeded);
    assert_eq!(f.store.len(ElementKind::Node), 0);

    let health = book.ruleset_status(ruleset).unwrap();
    assert!(!health.ready);
    assert_eq!(health.detail.len(), 1);
}

#[test]
fn test_failed_rule_rolls_back_and_later_rules_still_run() {
    let mut f = Fixture::new();
    let source = f.node("n1", "Source");
    let target = f.node("n2", "Target");
    let far = f.node("n3", "Far end");
    let doomed = f.node("n4", "Doomed");
    let link = f.link("l1", source, far);
    f.add_property(ElementRef::node(source), "colour", "red");
    // An owner key with no Institution behind it makes the merge fail half way.
    f.store
        .node_mut(source)
        .unwrap()
        .owners
        .insert(SeqKey(999));
    let before = f.store.clone();

    let mut book = RuleBook::new();
    let ruleset = book
        .insert_ruleset(
            Ruleset::new("merge then delete")
                .with_rule(
                    Rule::new("merge")
                        .with_priority(1)
                        .with_criterion(by_id(ElementKind::Node, "n1"))
                        .with_action(
                            Action::new(ActionType::MergeInto(ElementKind::Node))
                                .with_info(ID_KEY, "n2"),
                        ),
                )
                .with_rule(
                    Rule::new("delete")
                        .with_priority(2)
                        .with_criterion(by_id(ElementKind::Node, "n4"))
                        .with_action(Action::new(ActionType::Delete(ElementKind::Node))),
                ),
        )
        .unwrap();

    let report = book.apply_ruleset(&mut f.store, ruleset).unwrap();
    assert_eq!(report.rules.len(), 2);
    assert!(matches!(
        report.rules[0].outcome,
        RuleOutcome::Failed(CollationError::NotFound(_))
    ));
    assert_eq!(report.rules[0].status(), RuleStatus::RanWithFailures);
    assert_eq!(report.rules[1].status(), RuleStatus::Succeeded);

    assert!(f.store.node(source).is_some());
    assert!(f.properties(ElementRef::node(target)).is_empty());
    assert_eq!(
        f.store.link(link).unwrap().endpoints(),
        [source, far].into_iter().collect()
    );
    assert!(f.store.node(doomed).is_none());
    let mut expected = before;
    expected.delete_element(ElementRef::node(doomed)).unwrap();
    assert_eq!(f.store, expected);
}

#[test]
fn test_rules_and_rulesets_run_by_priority() {
    let mut f = Fixture::new();
    let n = f.node("n1", "A");
    f.add_property(ElementRef::node(n), "tag", "x");

    let delete = Rule::new("delete")
        .with_criterion(by_id(ElementKind::Node, "n1"))
        .with_action(Action::new(ActionType::Delete(ElementKind::Node)));
    let strip = Rule::new("strip")
        .with_criterion(by_id(ElementKind::Node, "n1"))
        .with_action(
            Action::new(ActionType::DeleteTagProperty(ElementKind::Node)).with_info("value", "x"),
        );

    let mut book = RuleBook::new();
    book.insert_ruleset(Ruleset::new("late").with_priority(10).with_rule(delete))
        .unwrap();
    book.insert_ruleset(Ruleset::new("early").with_priority(-5).with_rule(strip))
        .unwrap();
    book.insert_ruleset({
        let mut disabled = Ruleset::new("disabled").with_priority(-10);
        disabled.enabled = false;
        disabled
    })
    .unwrap();

    let report = book.apply_all(&mut f.store);
    let names: Vec<&str> = report.rules.iter().map(|r| r.rule_name.as_str()).collect();
    assert_eq!(names, vec!["strip", "delete"]);
    assert_eq!(report.count(RuleStatus::Succeeded), 2);
    assert_eq!(report.affected().nodes.len(), 1);
}

#[test]
fn test_resolution_failure_only_stops_that_element() {
    let mut f = Fixture::new();
    f.node("a", "A1");
    f.node("a", "A2");
    let b = f.node("b", "B");
    f.node("target", "Target");

    // "a" has two copies, so every matched element aborts but is still visited.
    let rule = Rule::new("merge everything")
        .with_criterion(MatchCriterion::new(MatchType::ByTopology(ElementKind::Node)).with_info(TOPOLOGY_ID_KEY, "topo-1"))
        .with_action(
            Action::new(ActionType::MergeInto(ElementKind::Node)).with_info(ID_KEY, "a"),
        );
    let report = run(&mut f.store, rule);
    assert_eq!(report.status(), RuleStatus::RanWithFailures);
    let log = report.log().unwrap();
    assert_eq!(log.action_logs.len(), 4);
    assert!(log.action_logs.iter().all(|a| !a.succeeded));
    assert!(f.store.node(b).is_some());
}

#[test]
fn test_api_message_shape() {
    let mut f = Fixture::new();
    let n = f.node("n1", "A");
    let report = run(
        &mut f.store,
        Rule::new("delete")
            .with_criterion(by_id(ElementKind::Node, "n1"))
            .with_action(Action::new(ActionType::Delete(ElementKind::Node))),
    );
    let message = report.log().unwrap().api_message();
    assert_eq!(message["rule"]["name"], "delete");
    assert_eq!(message["matched_elements"]["type"], "Node");
    assert_eq!(message["matched_elements"]["quantity"], 1);
    assert_eq!(message["matched_elements"]["primary_keys"][0], n.0);
    assert_eq!(message["actions"][0]["action"], "Delete Node");
    assert_eq!(message["affected"]["nodes"][0], n.0);
}

// ------------------------------------------------------------------------------------------------
// Configuration
// ------------------------------------------------------------------------------------------------

#[test]
fn test_clone_rule_names_and_copies_parts() {
    let mut book = RuleBook::new();
    let ruleset = book.insert_ruleset(Ruleset::new("rs")).unwrap();
    let original = book
        .add_rule(
            ruleset,
            Rule::new("Merge")
                .with_criterion(by_id(ElementKind::Node, "n1"))
                .with_action(
                    Action::new(ActionType::MergeInto(ElementKind::Node)).with_info(ID_KEY, "n2"),
                ),
        )
        .unwrap();

    let first = book.clone_rule(original).unwrap();
    let second = book.clone_rule(original).unwrap();
    let (_, first) = book.rule(first).unwrap();
    assert_eq!(first.name, "Merge 1");
    assert_eq!(first.actions.len(), 1);
    assert_eq!(first.actions[0].infos, vec![Info::new(ID_KEY, "n2")]);
    assert_eq!(book.rule(second).unwrap().1.name, "Merge 2");
    assert_eq!(book.ruleset(ruleset).unwrap().rules.len(), 3);

    assert!(book.add_rule(ruleset, Rule::new("Merge")).is_err());
}

#[test]
fn test_enable_disable_all() {
    let mut book = RuleBook::with_defaults().unwrap();
    book.disable_all();
    assert!(book.ordered_rulesets().is_empty());
    book.enable_all();
    assert_eq!(book.ordered_rulesets().len(), 2);

    let default = book.ruleset_by_name(DEFAULT_RULESET_NAME).unwrap().id;
    let ruleset = book.ruleset_mut(default).unwrap();
    ruleset.disable_all();
    assert!(ruleset.ordered_rules().is_empty());
}

#[test]
fn test_restore_defaults_recreates_both_rulesets() {
    let mut book = RuleBook::with_defaults().unwrap();
    let default = book.ruleset_by_name(DEFAULT_RULESET_NAME).unwrap().id;
    book.ruleset_mut(default).unwrap().rules.clear();

    book.restore_defaults().unwrap();
    assert_eq!(book.rulesets().len(), 2);
    let default = book.ruleset_by_name(DEFAULT_RULESET_NAME).unwrap();
    assert_eq!(default.rules.len(), 3);
    assert!(book.ruleset_status(default.id).unwrap().ready);
    let custom = book.ruleset_by_name(CUSTOM_RULESET_NAME).unwrap();
    assert_eq!(custom.priority, -1);
    assert!(custom.rules.is_empty());
}

#[test]
fn test_transfer_round_trip_and_replacement() {
    let book = RuleBook::with_defaults().unwrap();
    let document = export_rulesets(&book, None).unwrap();
    assert!(document.contains("\"match_type\": \"Match Duplicate Institutions\""));
    assert!(document.contains("\"actioninfo_set\""));

    let mut target = RuleBook::with_defaults().unwrap();
    let result = import_rulesets(&mut target, &document).unwrap();
    assert_eq!(result.created.len(), 2);
    assert!(result.invalid.is_empty());
    assert_eq!(target.rulesets().len(), 2);
    assert_eq!(
        export_rulesets(&target, None).unwrap(),
        document,
        "re-imported rulesets export identically"
    );
}

#[test]
fn test_transfer_rejects_bad_documents() {
    let mut book = RuleBook::new();
    assert!(matches!(
        import_rulesets(&mut book, "not json"),
        Err(CollationError::RulesetParse(_))
    ));
    assert!(matches!(
        import_rulesets(&mut book, "{\"name\": \"x\"}"),
        Err(CollationError::RulesetParse(_))
    ));
    assert!(matches!(
        import_rulesets(&mut book, "[{\"name\": \"x\"}, 3]"),
        Err(CollationError::RulesetParse(_))
    ));
    assert!(book.rulesets().is_empty());
}

#[test]
fn test_transfer_collects_invalid_rulesets() {
    let mut book = RuleBook::with_defaults().unwrap();
    let document = r#"[
        {"name": "Default ID Collision Resolution", "rules": [
            {"name": "bogus", "match_criteria": [{"match_type": "Match Planets", "matchinfo_set": []}]}
        ]},
        {"name": "extra", "priority": 5, "rules": [
            {"name": "drop n1", "enabled": true, "priority": 1,
             "match_criteria": [{"match_type": "Match Nodes by ID", "matchinfo_set": [{"key": "ID", "value": "n1"}]}],
             "actions": [{"action_type": "Delete Node", "actioninfo_set": []}]}
        ]}
    ]"#;
    let result = import_rulesets(&mut book, document).unwrap();
    assert_eq!(result.created.len(), 1);
    assert_eq!(result.invalid.len(), 1);
    assert!(result.invalid[0].reason.contains("Match Planets"));
    // The invalid replacement left the existing Ruleset untouched.
    assert_eq!(
        book.ruleset_by_name(DEFAULT_RULESET_NAME).unwrap().rules.len(),
        3
    );
    assert_eq!(book.ruleset_by_name("extra").unwrap().priority, 5);
}
