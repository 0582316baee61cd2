//! Export of a Topology tree into the [ParsedTopology] document shape.
//!
//! Each exported Topology is self-contained: owners and Link endpoints living elsewhere are
//! copied in, marked with the external-origin Property so a later import can fold them back
//! onto their originals.

use crate::{
    config::CollationConfig,
    error::CollationError,
    import::parsed::{ParsedInstitution, ParsedLink, ParsedNode, ParsedProperties, ParsedTopology},
    properties::{ElementBase, ElementKind, ElementRef, Property, SeqKey, Topology},
    store::TopologyStore,
};
use std::collections::BTreeSet;

fn group_properties<'a>(properties: impl Iterator<Item = &'a Property>) -> ParsedProperties {
    let mut grouped = ParsedProperties::new();
    for property in properties {
        grouped
            .entry(property.name.clone())
            .or_default()
            .push(property.value.clone());
    }
    grouped
}

pub struct Exporter<'a> {
    store: &'a TopologyStore,
    config: &'a CollationConfig,
}

impl<'a> Exporter<'a> {
    pub fn new(store: &'a TopologyStore, config: &'a CollationConfig) -> Self {
        Exporter { store, config }
    }

    /// Export `root` and its descendants. Without a root the main Topology is used.
    pub fn export_topology(&self, root: Option<SeqKey>) -> Result<ParsedTopology, CollationError> {
        let root = match root {
            Some(key) => key,
            None => self
                .store
                .main_topology()
                .ok()
                .flatten()
                .ok_or(CollationError::MissingRootTopology)?,
        };
        let topology = self.store.require_topology(root)?;
        tracing::info!("Exporting {} tree.", topology.log_str());
        self.export_tree(topology)
    }

    fn export_tree(&self, topology: &Topology) -> Result<ParsedTopology, CollationError> {
        let mut children = Vec::new();
        for child in self.store.children_of(topology.key) {
            let child = self.store.require_topology(child)?;
            children.push(self.export_tree(child)?);
        }
        let mut parsed = TopologyExporter::new(self.store, self.config, topology).export()?;
        parsed.topologies = children;
        Ok(parsed)
    }
}

/// Exports the direct contents of one Topology.
struct TopologyExporter<'a> {
    store: &'a TopologyStore,
    config: &'a CollationConfig,
    topology: &'a Topology,
    institutions: BTreeSet<SeqKey>,
    nodes: BTreeSet<SeqKey>,
    exported: BTreeSet<SeqKey>,
    parsed: ParsedTopology,
}

impl<'a> TopologyExporter<'a> {
    fn new(store: &'a TopologyStore, config: &'a CollationConfig, topology: &'a Topology) -> Self {
        let mut parsed = ParsedTopology::new(&topology.grenml_id, &topology.name);
        parsed.version = topology.version.clone();
        parsed.properties = group_properties(topology.properties.iter());
        TopologyExporter {
            store,
            config,
            topology,
            institutions: store
                .members_of(ElementKind::Institution, topology.key)
                .into_iter()
                .collect(),
            nodes: store
                .members_of(ElementKind::Node, topology.key)
                .into_iter()
                .collect(),
            exported: BTreeSet::new(),
            parsed,
        }
    }

    fn export(mut self) -> Result<ParsedTopology, CollationError> {
        tracing::debug!("[TopologyExporter::export] {}", self.topology.log_str());
        let owner = self
            .topology
            .owner
            .ok_or_else(|| CollationError::NoTopologyOwner(self.topology.log_str()))?;
        let owner_inst = self.store.require(ElementRef::institution(owner))?;
        self.parsed.primary_owner = Some(owner_inst.grenml_id.clone());
        if !self.institutions.contains(&owner) {
            self.export_institution(owner, true)?;
        }

        for key in self.institutions.clone() {
            self.export_institution(key, false)?;
        }
        for key in self.nodes.clone() {
            self.export_node(key, false)?;
        }
        let links = self
            .store
            .members_of(ElementKind::Link, self.topology.key);
        for key in links {
            self.export_link(key)?;
        }
        tracing::debug!(
            "[TopologyExporter::export] {}: {} Institution(s), {} Node(s), {} Link(s)",
            self.topology.log_str(),
            self.parsed.institutions.len(),
            self.parsed.nodes.len(),
            self.parsed.links.len()
        );
        Ok(self.parsed)
    }

    /// Properties of `base`, plus the external-origin marker when `external`.
    fn properties(&self, base: &ElementBase, external: bool) -> ParsedProperties {
        let mut properties = group_properties(base.properties.iter());
        if external {
            let origin: Vec<&str> = base
                .topologies
                .iter()
                .filter_map(|t| self.store.topology(*t))
                .map(|t| t.grenml_id.as_str())
                .collect();
            properties
                .entry(self.config.external_property_key.clone())
                .or_default()
                .push(origin.join(&self.config.external_property_delimiter));
        }
        properties
    }

    fn owner_ids(&mut self, owners: &BTreeSet<SeqKey>) -> Result<Vec<String>, CollationError> {
        let mut ids = Vec::new();
        for owner in owners.iter() {
            if !self.institutions.contains(owner) {
                self.export_institution(*owner, true)?;
            }
            ids.push(self.store.require(ElementRef::institution(*owner))?.grenml_id.clone());
        }
        Ok(ids)
    }

    fn export_institution(&mut self, key: SeqKey, external: bool) -> Result<(), CollationError> {
        let store = self.store;
        let institution = store
            .institution(key)
            .ok_or_else(|| CollationError::NotFound(format!("Institution [{key}]")))?;
        if !self.exported.insert(key) {
            tracing::debug!(
                "Skipping Institution already exported: {}",
                institution.base.log_str()
            );
            return Ok(());
        }
        if external {
            tracing::debug!(
                "Exporting owner Institution {} from another Topology",
                institution.base.log_str()
            );
        }
        let base = &institution.base;
        let location = &institution.location;
        let properties = self.properties(base, external);
        self.parsed.institutions.push(ParsedInstitution {
            id: base.grenml_id.clone(),
            name: base.name.clone(),
            short_name: base.short_name.clone(),
            version: base.version.clone(),
            latitude: Some(location.latitude),
            longitude: Some(location.longitude),
            altitude: location.altitude,
            address: location.address.clone(),
            unlocode: location.unlocode.clone(),
            properties,
        });
        Ok(())
    }

    fn export_node(&mut self, key: SeqKey, external: bool) -> Result<(), CollationError> {
        let store = self.store;
        let node = store
            .node(key)
            .ok_or_else(|| CollationError::NotFound(format!("Node [{key}]")))?;
        if !self.exported.insert(key) {
            tracing::debug!("Skipping Node already exported: {}", node.base.log_str());
            return Ok(());
        }
        if external {
            tracing::debug!(
                "Exporting endpoint Node {} from another Topology",
                node.base.log_str()
            );
        }
        let base = &node.base;
        let properties = self.properties(base, external);
        let owners = self.owner_ids(&node.owners)?;
        self.parsed.nodes.push(ParsedNode {
            id: base.grenml_id.clone(),
            name: base.name.clone(),
            short_name: base.short_name.clone(),
            version: base.version.clone(),
            latitude: Some(node.location.latitude),
            longitude: Some(node.location.longitude),
            altitude: node.location.altitude,
            address: node.location.address.clone(),
            unlocode: node.location.unlocode.clone(),
            lifetime_start: node.lifetime.start.clone(),
            lifetime_end: node.lifetime.end.clone(),
            owners,
            properties,
        });
        Ok(())
    }

    fn export_link(&mut self, key: SeqKey) -> Result<(), CollationError> {
        let store = self.store;
        let link = store
            .link(key)
            .ok_or_else(|| CollationError::NotFound(format!("Link [{key}]")))?;
        if !self.exported.insert(key) {
            tracing::debug!("Skipping Link already exported: {}", link.base.log_str());
            return Ok(());
        }
        let mut endpoints = Vec::new();
        for endpoint in [link.node_a, link.node_b] {
            if !self.nodes.contains(&endpoint) {
                self.export_node(endpoint, true)?;
            }
            endpoints.push(store.require(ElementRef::node(endpoint))?.grenml_id.clone());
        }
        let base = &link.base;
        let owners = self.owner_ids(&link.owners)?;
        let properties = self.properties(base, false);
        self.parsed.links.push(ParsedLink {
            id: base.grenml_id.clone(),
            name: base.name.clone(),
            short_name: base.short_name.clone(),
            version: base.version.clone(),
            lifetime_start: link.lifetime.start.clone(),
            lifetime_end: link.lifetime.end.clone(),
            nodes: endpoints,
            owners,
            properties,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::{Institution, Link, Node};
    use test_log::test;

    fn populated() -> (TopologyStore, SeqKey, SeqKey) {
        let mut store = TopologyStore::new();
        let backbone = store.save_topology(Topology::new("t1", "Backbone")).unwrap();
        let mut regional = Topology::new("t2", "Regional");
        regional.parent = Some(backbone);
        let regional = store.save_topology(regional).unwrap();

        let mut i1 = Institution::new("i1", "Institution One");
        i1.base.topologies.insert(backbone);
        let i1 = store.insert_institution(i1).unwrap();
        store.set_topology_owner(backbone, Some(i1)).unwrap();
        store.set_topology_owner(regional, Some(i1)).unwrap();

        let mut n1 = Node::new("n1", "Node One");
        n1.base.topologies.insert(backbone);
        n1.owners.insert(i1);
        let n1 = store.insert_node(n1).unwrap();
        let mut n2 = Node::new("n2", "Node Two");
        n2.base.topologies.insert(regional);
        n2.owners.insert(i1);
        let n2 = store.insert_node(n2).unwrap();

        let mut link = Link::new("l1", "Link One", n2, n1);
        link.base.topologies.insert(regional);
        link.owners.insert(i1);
        store.insert_link(link).unwrap();
        (store, backbone, regional)
    }

    #[test]
    fn test_default_root_is_main_topology() {
        let (store, _, _) = populated();
        let config = CollationConfig::default();
        let parsed = Exporter::new(&store, &config).export_topology(None).unwrap();
        assert_eq!(parsed.id, "t1");
        assert_eq!(parsed.primary_owner.as_deref(), Some("i1"));
        assert_eq!(parsed.topologies.len(), 1);
        assert_eq!(parsed.topologies[0].id, "t2");
    }

    #[test]
    fn test_external_references_are_marked() {
        let (store, _, _) = populated();
        let config = CollationConfig::default();
        let parsed = Exporter::new(&store, &config).export_topology(None).unwrap();
        let regional = &parsed.topologies[0];

        // i1 owns the Topology, n2 and l1 but is only a member of t1.
        let owner = regional.institution("i1").unwrap();
        assert_eq!(owner.properties.get("!-from_topology"), Some(&vec!["t1".to_string()]));
        assert_eq!(regional.institutions.len(), 1);

        let endpoint = regional.node("n1").unwrap();
        assert_eq!(endpoint.properties.get("!-from_topology"), Some(&vec!["t1".to_string()]));
        assert!(regional.node("n2").unwrap().properties.is_empty());

        let link = regional.link("l1").unwrap();
        assert_eq!(link.nodes, vec!["n2".to_string(), "n1".to_string()]);
        assert!(regional.validate().is_empty());
    }

    #[test]
    fn test_missing_owner_fails() {
        let (mut store, _, regional) = populated();
        store.set_topology_owner(regional, None).unwrap();
        let config = CollationConfig::default();
        let err = Exporter::new(&store, &config).export_topology(None).unwrap_err();
        assert!(matches!(err, CollationError::NoTopologyOwner(_)));
    }

    #[test]
    fn test_no_main_topology_fails() {
        let store = TopologyStore::new();
        let config = CollationConfig::default();
        let err = Exporter::new(&store, &config).export_topology(None).unwrap_err();
        assert_eq!(err, CollationError::MissingRootTopology);
    }
}
