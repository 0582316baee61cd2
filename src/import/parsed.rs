//! The parsed GRENML document shape consumed by the importer and produced by the exporter.
//!
//! Cross references (owners, primary owner, Link endpoints) are GRENML IDs that resolve within
//! the same parsed Topology. Property values are grouped by property name.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub type ParsedProperties = BTreeMap<String, Vec<String>>;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedInstitution {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlocode: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: ParsedProperties,
}

impl ParsedInstitution {
    pub fn new(id: &str, name: &str) -> Self {
        ParsedInstitution {
            id: id.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedNode {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlocode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifetime_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifetime_end: Option<String>,
    #[serde(default)]
    pub owners: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: ParsedProperties,
}

impl ParsedNode {
    pub fn new(id: &str, name: &str, owners: &[&str]) -> Self {
        ParsedNode {
            id: id.to_string(),
            name: name.to_string(),
            owners: owners.iter().map(|o| o.to_string()).collect(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedLink {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifetime_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifetime_end: Option<String>,
    pub nodes: Vec<String>,
    #[serde(default)]
    pub owners: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: ParsedProperties,
}

impl ParsedLink {
    pub fn new(id: &str, name: &str, nodes: &[&str], owners: &[&str]) -> Self {
        ParsedLink {
            id: id.to_string(),
            name: name.to_string(),
            nodes: nodes.iter().map(|n| n.to_string()).collect(),
            owners: owners.iter().map(|o| o.to_string()).collect(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedTopology {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: ParsedProperties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_owner: Option<String>,
    #[serde(default)]
    pub institutions: Vec<ParsedInstitution>,
    #[serde(default)]
    pub nodes: Vec<ParsedNode>,
    #[serde(default)]
    pub links: Vec<ParsedLink>,
    #[serde(default)]
    pub topologies: Vec<ParsedTopology>,
}

impl ParsedTopology {
    pub fn new(id: &str, name: &str) -> Self {
        ParsedTopology {
            id: id.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Depth-first, parents before children.
    pub fn iter(&self) -> impl Iterator<Item = &ParsedTopology> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(next.topologies.iter().rev());
            Some(next)
        })
    }

    pub fn find(&self, id: &str) -> Option<&ParsedTopology> {
        self.iter().find(|t| t.id == id)
    }

    pub fn institution(&self, id: &str) -> Option<&ParsedInstitution> {
        self.institutions.iter().find(|i| i.id == id)
    }

    pub fn node(&self, id: &str) -> Option<&ParsedNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn link(&self, id: &str) -> Option<&ParsedLink> {
        self.links.iter().find(|l| l.id == id)
    }

    /// Reference errors across the whole tree. Empty when the document is importable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let mut seen = BTreeSet::new();
        for topology in self.iter() {
            if topology.id.trim().is_empty() {
                errors.push(format!("Topology \"{}\" has no ID", topology.name));
            } else if !seen.insert(topology.id.as_str()) {
                errors.push(format!("Topology ID {} is used more than once", topology.id));
            }
            topology.validate_references(&mut errors);
        }
        errors
    }

    fn validate_references(&self, errors: &mut Vec<String>) {
        let institutions: BTreeSet<&str> = self.institutions.iter().map(|i| i.id.as_str()).collect();
        let nodes: BTreeSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();

        if let Some(owner) = self.primary_owner.as_deref() {
            if !institutions.contains(owner) {
                errors.push(format!(
                    "Topology {}: primary owner {} is not an Institution of the Topology",
                    self.id, owner
                ));
            }
        }
        let node_owners = self.nodes.iter().map(|n| ("Node", &n.id, &n.owners));
        let link_owners = self.links.iter().map(|l| ("Link", &l.id, &l.owners));
        for (kind, id, owners) in node_owners.chain(link_owners) {
            for owner in owners.iter().filter(|o| !institutions.contains(o.as_str())) {
                errors.push(format!(
                    "Topology {}: {} {} references unknown owner {}",
                    self.id, kind, id, owner
                ));
            }
        }
        for link in self.links.iter() {
            for endpoint in link.nodes.iter().filter(|n| !nodes.contains(n.as_str())) {
                errors.push(format!(
                    "Topology {}: Link {} references unknown endpoint {}",
                    self.id, link.id, endpoint
                ));
            }
        }
    }
}
