//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use grenml_collation::{
    config::CollationConfig,
    import::{ParsedInstitution, ParsedLink, ParsedNode, ParsedTopology},
    session::CollationSession,
};

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// A session with the default Rulesets and default configuration.
#[allow(dead_code)]
pub fn session() -> CollationSession {
    CollationSession::new(CollationConfig::default()).unwrap()
}

/// Backbone Topology `t1` owned by `i1`, with Nodes `n1`, `n2` and Link `l1` between them.
#[allow(dead_code)]
pub fn backbone() -> ParsedTopology {
    let mut doc = ParsedTopology::new("t1", "Backbone");
    doc.primary_owner = Some("i1".to_string());
    doc.institutions.push(ParsedInstitution::new("i1", "Institution One"));
    doc.nodes.push(ParsedNode::new("n1", "Node One", &["i1"]));
    doc.nodes.push(ParsedNode::new("n2", "Node Two", &["i1"]));
    doc.links
        .push(ParsedLink::new("l1", "Link One", &["n1", "n2"], &["i1"]));
    doc
}

/// Regional Topology `t2` owned by `i2`. Its Link `l2` reaches `n1` of the backbone, which
/// the document carries as an external placeholder.
#[allow(dead_code)]
pub fn regional() -> ParsedTopology {
    let mut doc = ParsedTopology::new("t2", "Regional");
    doc.primary_owner = Some("i2".to_string());
    doc.institutions.push(ParsedInstitution::new("i2", "Institution Two"));
    doc.nodes.push(ParsedNode::new("n3", "Node Three", &["i2"]));
    let mut external = ParsedNode::new("n1", "Node One", &[]);
    external
        .properties
        .insert("!-from_topology".to_string(), vec!["t1".to_string()]);
    doc.nodes.push(external);
    doc.links
        .push(ParsedLink::new("l2", "Link Two", &["n3", "n1"], &["i2"]));
    doc
}

/// Order-independent view of a parsed tree for comparisons across import/export cycles.
#[allow(dead_code)]
pub fn normalized(doc: &ParsedTopology) -> ParsedTopology {
    let mut doc = doc.clone();
    doc.institutions.sort_by(|a, b| a.id.cmp(&b.id));
    doc.nodes.sort_by(|a, b| a.id.cmp(&b.id));
    for node in doc.nodes.iter_mut() {
        node.owners.sort();
    }
    doc.links.sort_by(|a, b| a.id.cmp(&b.id));
    for link in doc.links.iter_mut() {
        link.owners.sort();
        link.nodes.sort();
    }
    doc.topologies = doc.topologies.iter().map(normalized).collect();
    doc.topologies.sort_by(|a, b| a.id.cmp(&b.id));
    doc
}
