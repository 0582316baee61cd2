//! TopologyStore: the in-memory entity store.
//!
//! Elements reference each other by [SeqKey]. Reverse relationships (links of a node, elements
//! owned by an institution, members of a topology) are answered by filtering, so there is no
//! secondary index to keep in sync when the replacement primitive rewires references.

use crate::{
    error::CollationError,
    properties::{
        Element, ElementBase, ElementKind, ElementRef, Institution, Link, Node, Property, SeqKey,
        Topology,
    },
};
use petgraph::algo::kosaraju_scc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Keys removed (or slated for removal) by a delete, partitioned by record kind.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteSet {
    pub institutions: BTreeSet<SeqKey>,
    pub nodes: BTreeSet<SeqKey>,
    pub links: BTreeSet<SeqKey>,
    pub topologies: BTreeSet<SeqKey>,
}

impl DeleteSet {
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len(&self) -> usize {
        self.institutions.len() + self.nodes.len() + self.links.len() + self.topologies.len()
    }

    pub fn of_kind(&self, kind: ElementKind) -> &BTreeSet<SeqKey> {
        match kind {
            ElementKind::Institution => &self.institutions,
            ElementKind::Node => &self.nodes,
            ElementKind::Link => &self.links,
        }
    }

    pub fn union(&mut self, other: DeleteSet) {
        self.institutions.extend(other.institutions);
        self.nodes.extend(other.nodes);
        self.links.extend(other.links);
        self.topologies.extend(other.topologies);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyStore {
    last_key: u64,
    institutions: BTreeMap<SeqKey, Institution>,
    nodes: BTreeMap<SeqKey, Node>,
    links: BTreeMap<SeqKey, Link>,
    topologies: BTreeMap<SeqKey, Topology>,
}

impl TopologyStore {
    pub fn new() -> TopologyStore {
        TopologyStore::default()
    }

    fn assign_key(&mut self) -> SeqKey {
        self.last_key += 1;
        SeqKey(self.last_key)
    }

    /// Run `f` as one unit: on `Err` every mutation it made is discarded.
    pub fn transaction<T, F>(&mut self, f: F) -> Result<T, CollationError>
    where
        F: FnOnce(&mut TopologyStore) -> Result<T, CollationError>,
    {
        let snapshot = self.clone();
        match f(self) {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::debug!("[TopologyStore::transaction] rolling back: {}", e);
                *self = snapshot;
                Err(e)
            }
        }
    }

    // ----------------------------------------------------------------------------------------
    // Read access
    // ----------------------------------------------------------------------------------------

    pub fn institution(&self, key: SeqKey) -> Option<&Institution> {
        self.institutions.get(&key)
    }

    pub fn node(&self, key: SeqKey) -> Option<&Node> {
        self.nodes.get(&key)
    }

    pub fn link(&self, key: SeqKey) -> Option<&Link> {
        self.links.get(&key)
    }

    pub fn topology(&self, key: SeqKey) -> Option<&Topology> {
        self.topologies.get(&key)
    }

    pub fn institution_mut(&mut self, key: SeqKey) -> Option<&mut Institution> {
        self.institutions.get_mut(&key)
    }

    pub fn node_mut(&mut self, key: SeqKey) -> Option<&mut Node> {
        self.nodes.get_mut(&key)
    }

    pub fn link_mut(&mut self, key: SeqKey) -> Option<&mut Link> {
        self.links.get_mut(&key)
    }

    pub fn institutions(&self) -> impl Iterator<Item = &Institution> {
        self.institutions.values()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub fn topologies(&self) -> impl Iterator<Item = &Topology> {
        self.topologies.values()
    }

    pub fn element(&self, element: ElementRef) -> Option<&ElementBase> {
        match element.kind {
            ElementKind::Institution => self.institutions.get(&element.key).map(|e| e.base()),
            ElementKind::Node => self.nodes.get(&element.key).map(|e| e.base()),
            ElementKind::Link => self.links.get(&element.key).map(|e| e.base()),
        }
    }

    pub(crate) fn element_mut(&mut self, element: ElementRef) -> Option<&mut ElementBase> {
        match element.kind {
            ElementKind::Institution => self
                .institutions
                .get_mut(&element.key)
                .map(|e| e.base_mut()),
            ElementKind::Node => self.nodes.get_mut(&element.key).map(|e| e.base_mut()),
            ElementKind::Link => self.links.get_mut(&element.key).map(|e| e.base_mut()),
        }
    }

    pub fn require(&self, element: ElementRef) -> Result<&ElementBase, CollationError> {
        self.element(element)
            .ok_or_else(|| CollationError::NotFound(format!("{element} is not in the store")))
    }

    fn require_mut(&mut self, element: ElementRef) -> Result<&mut ElementBase, CollationError> {
        self.element_mut(element)
            .ok_or_else(|| CollationError::NotFound(format!("{element} is not in the store")))
    }

    pub fn require_topology(&self, key: SeqKey) -> Result<&Topology, CollationError> {
        self.topologies
            .get(&key)
            .ok_or_else(|| CollationError::NotFound(format!("Topology [{key}] is not in the store")))
    }

    pub fn contains(&self, element: ElementRef) -> bool {
        self.element(element).is_some()
    }

    /// `name <grenml_id> [key]` of a stored element, or a placeholder naming the dangling ref.
    pub fn log_str(&self, element: ElementRef) -> String {
        self.element(element)
            .map(|base| base.log_str())
            .unwrap_or_else(|| format!("<missing {element}>"))
    }

    /// All keys of one element kind, ascending (oldest first).
    pub fn keys(&self, kind: ElementKind) -> Vec<SeqKey> {
        match kind {
            ElementKind::Institution => self.institutions.keys().copied().collect(),
            ElementKind::Node => self.nodes.keys().copied().collect(),
            ElementKind::Link => self.links.keys().copied().collect(),
        }
    }

    pub fn len(&self, kind: ElementKind) -> usize {
        match kind {
            ElementKind::Institution => self.institutions.len(),
            ElementKind::Node => self.nodes.len(),
            ElementKind::Link => self.links.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.institutions.is_empty()
            && self.nodes.is_empty()
            && self.links.is_empty()
            && self.topologies.is_empty()
    }

    // ----------------------------------------------------------------------------------------
    // Filters
    // ----------------------------------------------------------------------------------------

    /// Keys of every element of `kind` satisfying `predicate`, ascending.
    pub fn filter_elements<P>(&self, kind: ElementKind, predicate: P) -> Vec<SeqKey>
    where
        P: Fn(&ElementBase) -> bool,
    {
        match kind {
            ElementKind::Institution => filter_map(&self.institutions, predicate),
            ElementKind::Node => filter_map(&self.nodes, predicate),
            ElementKind::Link => filter_map(&self.links, predicate),
        }
    }

    pub fn with_grenml_id(&self, kind: ElementKind, grenml_id: &str) -> Vec<SeqKey> {
        self.filter_elements(kind, |base| base.grenml_id == grenml_id)
    }

    /// Direct members of a topology (does not descend into sub-topologies).
    pub fn members_of(&self, kind: ElementKind, topology: SeqKey) -> Vec<SeqKey> {
        self.filter_elements(kind, |base| base.topologies.contains(&topology))
    }

    pub fn topology_by_grenml_id(&self, grenml_id: &str) -> Option<&Topology> {
        self.topologies.values().find(|t| t.grenml_id == grenml_id)
    }

    pub fn topology_by_name_and_parent(
        &self,
        name: &str,
        parent: Option<SeqKey>,
    ) -> Option<&Topology> {
        self.topologies
            .values()
            .find(|t| t.name == name && t.parent == parent)
    }

    pub fn links_of_node(&self, node: SeqKey) -> Vec<SeqKey> {
        self.links
            .values()
            .filter(|l| l.touches(node))
            .map(|l| l.base.key)
            .collect()
    }

    /// Nodes and Links listing `institution` among their owners.
    pub fn owned_elements(&self, institution: SeqKey) -> (Vec<SeqKey>, Vec<SeqKey>) {
        let nodes = self
            .nodes
            .values()
            .filter(|n| n.owners.contains(&institution))
            .map(|n| n.base.key)
            .collect();
        let links = self
            .links
            .values()
            .filter(|l| l.owners.contains(&institution))
            .map(|l| l.base.key)
            .collect();
        (nodes, links)
    }

    pub fn owned_topologies(&self, institution: SeqKey) -> Vec<SeqKey> {
        self.topologies
            .values()
            .filter(|t| t.owner == Some(institution))
            .map(|t| t.key)
            .collect()
    }

    pub fn owners_of(&self, element: ElementRef) -> BTreeSet<SeqKey> {
        match element.kind {
            ElementKind::Institution => BTreeSet::new(),
            ElementKind::Node => self
                .nodes
                .get(&element.key)
                .map(|n| n.owners.clone())
                .unwrap_or_default(),
            ElementKind::Link => self
                .links
                .get(&element.key)
                .map(|l| l.owners.clone())
                .unwrap_or_default(),
        }
    }

    pub fn children_of(&self, topology: SeqKey) -> Vec<SeqKey> {
        self.topologies
            .values()
            .filter(|t| t.parent == Some(topology))
            .map(|t| t.key)
            .collect()
    }

    // ----------------------------------------------------------------------------------------
    // Creation
    // ----------------------------------------------------------------------------------------

    fn prepare_base(&mut self, base: &mut ElementBase) -> Result<SeqKey, CollationError> {
        if let Some(missing) = base
            .topologies
            .iter()
            .find(|t| !self.topologies.contains_key(t))
        {
            return Err(CollationError::Store(format!(
                "{} references unknown Topology [{}]",
                base.log_str(),
                missing
            )));
        }
        if base.grenml_id.trim().is_empty() {
            base.grenml_id = uuid::Uuid::new_v4().to_string();
        }
        let key = self.assign_key();
        base.key = key;
        Ok(key)
    }

    fn check_owners(&self, owners: &BTreeSet<SeqKey>, log_str: &str) -> Result<(), CollationError> {
        match owners.iter().find(|o| !self.institutions.contains_key(o)) {
            Some(missing) => Err(CollationError::Store(format!(
                "{log_str} references unknown owner Institution [{missing}]"
            ))),
            None => Ok(()),
        }
    }

    pub fn insert_institution(&mut self, mut institution: Institution) -> Result<SeqKey, CollationError> {
        let key = self.prepare_base(&mut institution.base)?;
        tracing::debug!(
            "[TopologyStore::insert_institution] {}",
            institution.log_str()
        );
        self.institutions.insert(key, institution);
        Ok(key)
    }

    pub fn insert_node(&mut self, mut node: Node) -> Result<SeqKey, CollationError> {
        self.check_owners(&node.owners, &node.log_str())?;
        let key = self.prepare_base(&mut node.base)?;
        tracing::debug!("[TopologyStore::insert_node] {}", node.log_str());
        self.nodes.insert(key, node);
        Ok(key)
    }

    pub fn insert_link(&mut self, mut link: Link) -> Result<SeqKey, CollationError> {
        if link.node_a == link.node_b
            || !self.nodes.contains_key(&link.node_a)
            || !self.nodes.contains_key(&link.node_b)
        {
            return Err(CollationError::InvalidLinkEndpoints(link.log_str()));
        }
        self.check_owners(&link.owners, &link.log_str())?;
        let key = self.prepare_base(&mut link.base)?;
        tracing::debug!("[TopologyStore::insert_link] {}", link.log_str());
        self.links.insert(key, link);
        Ok(key)
    }

    /// Create or update a topology.
    ///
    /// Enforces a unique, non-empty GRENML ID and an acyclic parent chain. The first topology in
    /// a store becomes main; saving a main topology clears the flag everywhere else.
    pub fn save_topology(&mut self, mut topology: Topology) -> Result<SeqKey, CollationError> {
        if topology.grenml_id.trim().is_empty()
            || self
                .topologies
                .values()
                .any(|t| t.key != topology.key && t.grenml_id == topology.grenml_id)
        {
            return Err(CollationError::DuplicateTopologyId(topology.grenml_id));
        }
        if let Some(owner) = topology.owner {
            if !self.institutions.contains_key(&owner) {
                return Err(CollationError::Store(format!(
                    "Topology {} references unknown owner Institution [{}]",
                    topology.log_str(),
                    owner
                )));
            }
        }
        if let Some(parent) = topology.parent {
            if !self.topologies.contains_key(&parent) {
                return Err(CollationError::NotFound(format!(
                    "Parent Topology [{parent}] of {}",
                    topology.log_str()
                )));
            }
        }

        if topology.key.is_assigned() {
            if !self.topologies.contains_key(&topology.key) {
                return Err(CollationError::NotFound(format!(
                    "Topology {} is not in the store",
                    topology.log_str()
                )));
            }
            if let Some(parent) = topology.parent {
                if parent == topology.key || self.topology_subtree(topology.key)?.contains(&parent) {
                    return Err(CollationError::CircularTopology(topology.log_str()));
                }
            }
        } else {
            topology.key = self.assign_key();
        }

        let has_others = self.topologies.keys().any(|k| *k != topology.key);
        if !has_others {
            topology.main = true;
        }
        if topology.main {
            for other in self.topologies.values_mut() {
                other.main = false;
            }
        }
        let key = topology.key;
        tracing::debug!("[TopologyStore::save_topology] {}", topology.log_str());
        self.topologies.insert(key, topology);
        Ok(key)
    }

    pub fn topology_mut(&mut self, key: SeqKey) -> Option<&mut Topology> {
        self.topologies.get_mut(&key)
    }

    /// The topology flagged main, if any. More than one main topology is an error.
    pub fn main_topology(&self) -> Result<Option<SeqKey>, CollationError> {
        let mains: Vec<SeqKey> = self
            .topologies
            .values()
            .filter(|t| t.main)
            .map(|t| t.key)
            .collect();
        match mains.len() {
            0 => Ok(None),
            1 => Ok(mains.first().copied()),
            _ => Err(CollationError::MultipleMainTopologies),
        }
    }

    pub fn set_main_topology(&mut self, key: SeqKey) -> Result<(), CollationError> {
        self.require_topology(key)?;
        for topology in self.topologies.values_mut() {
            topology.main = topology.key == key;
        }
        Ok(())
    }

    /// If no topology is main and exactly one remains, it becomes main.
    pub(crate) fn ensure_main(&mut self) {
        if self.topologies.values().any(|t| t.main) || self.topologies.len() != 1 {
            return;
        }
        if let Some(sole) = self.topologies.values_mut().next() {
            tracing::debug!(
                "[TopologyStore::ensure_main] {} is now the main Topology",
                sole.log_str()
            );
            sole.main = true;
        }
    }

    // ----------------------------------------------------------------------------------------
    // Relationship mutation
    // ----------------------------------------------------------------------------------------

    pub fn set_dirty(&mut self, element: ElementRef, dirty: bool) -> Result<(), CollationError> {
        self.require_mut(element)?.dirty = dirty;
        Ok(())
    }

    pub fn add_to_topology(
        &mut self,
        element: ElementRef,
        topology: SeqKey,
    ) -> Result<(), CollationError> {
        self.require_topology(topology)?;
        self.require_mut(element)?.topologies.insert(topology);
        Ok(())
    }

    /// Returns whether the element was a member.
    pub fn remove_from_topology(
        &mut self,
        element: ElementRef,
        topology: SeqKey,
    ) -> Result<bool, CollationError> {
        Ok(self.require_mut(element)?.topologies.remove(&topology))
    }

    fn owner_set_mut(
        &mut self,
        element: ElementRef,
    ) -> Result<&mut BTreeSet<SeqKey>, CollationError> {
        let owners = match element.kind {
            ElementKind::Institution => {
                return Err(CollationError::Store(format!(
                    "{element} cannot have owner Institutions"
                )))
            }
            ElementKind::Node => self.nodes.get_mut(&element.key).map(|n| &mut n.owners),
            ElementKind::Link => self.links.get_mut(&element.key).map(|l| &mut l.owners),
        };
        owners.ok_or_else(|| CollationError::NotFound(format!("{element} is not in the store")))
    }

    pub fn add_owner(
        &mut self,
        element: ElementRef,
        institution: SeqKey,
    ) -> Result<(), CollationError> {
        if !self.institutions.contains_key(&institution) {
            return Err(CollationError::NotFound(format!(
                "Owner Institution [{institution}] is not in the store"
            )));
        }
        self.owner_set_mut(element)?.insert(institution);
        Ok(())
    }

    pub fn remove_owner(
        &mut self,
        element: ElementRef,
        institution: SeqKey,
    ) -> Result<bool, CollationError> {
        Ok(self.owner_set_mut(element)?.remove(&institution))
    }

    pub fn set_topology_owner(
        &mut self,
        topology: SeqKey,
        owner: Option<SeqKey>,
    ) -> Result<(), CollationError> {
        if let Some(owner) = owner {
            if !self.institutions.contains_key(&owner) {
                return Err(CollationError::NotFound(format!(
                    "Owner Institution [{owner}] is not in the store"
                )));
            }
        }
        let entry = self.topologies.get_mut(&topology).ok_or_else(|| {
            CollationError::NotFound(format!("Topology [{topology}] is not in the store"))
        })?;
        entry.owner = owner;
        Ok(())
    }

    pub fn add_property(
        &mut self,
        element: ElementRef,
        property: Property,
    ) -> Result<(), CollationError> {
        self.require_mut(element)?.properties.push(property);
        Ok(())
    }

    /// Remove properties by (lower-cased) name and, if given, exact value.
    /// Returns how many were removed.
    pub fn remove_properties(
        &mut self,
        element: ElementRef,
        name: &str,
        value: Option<&str>,
    ) -> Result<usize, CollationError> {
        let name = name.to_lowercase();
        let base = self.require_mut(element)?;
        let before = base.properties.len();
        base.properties
            .retain(|p| !(p.name == name && value.map_or(true, |v| p.value == v)));
        Ok(before - base.properties.len())
    }

    // ----------------------------------------------------------------------------------------
    // Deletion
    // ----------------------------------------------------------------------------------------

    /// Delete one element. Deleting a Node also deletes its Links; deleting an Institution only
    /// clears the ownership references pointing at it.
    pub fn delete_element(&mut self, element: ElementRef) -> Result<DeleteSet, CollationError> {
        self.require(element)?;
        let mut deleted = DeleteSet::default();
        match element.kind {
            ElementKind::Institution => self.delete_institution(element.key, &mut deleted),
            ElementKind::Node => self.delete_node(element.key, &mut deleted),
            ElementKind::Link => self.delete_link(element.key, &mut deleted),
        }
        Ok(deleted)
    }

    pub(crate) fn delete_link(&mut self, key: SeqKey, deleted: &mut DeleteSet) {
        if let Some(link) = self.links.remove(&key) {
            tracing::debug!("[TopologyStore::delete_link] {}", link.log_str());
            deleted.links.insert(key);
        }
    }

    pub(crate) fn delete_node(&mut self, key: SeqKey, deleted: &mut DeleteSet) {
        for link in self.links_of_node(key) {
            self.delete_link(link, deleted);
        }
        if let Some(node) = self.nodes.remove(&key) {
            tracing::debug!("[TopologyStore::delete_node] {}", node.log_str());
            deleted.nodes.insert(key);
        }
    }

    pub(crate) fn delete_institution(&mut self, key: SeqKey, deleted: &mut DeleteSet) {
        for node in self.nodes.values_mut() {
            node.owners.remove(&key);
        }
        for link in self.links.values_mut() {
            link.owners.remove(&key);
        }
        for topology in self.topologies.values_mut() {
            if topology.owner == Some(key) {
                topology.owner = None;
            }
        }
        if let Some(institution) = self.institutions.remove(&key) {
            tracing::debug!(
                "[TopologyStore::delete_institution] {}",
                institution.log_str()
            );
            deleted.institutions.insert(key);
        }
    }

    pub(crate) fn remove_topology_record(&mut self, key: SeqKey, deleted: &mut DeleteSet) {
        for base in self
            .institutions
            .values_mut()
            .map(|e| &mut e.base)
            .chain(self.nodes.values_mut().map(|e| &mut e.base))
            .chain(self.links.values_mut().map(|e| &mut e.base))
        {
            base.topologies.remove(&key);
        }
        if let Some(topology) = self.topologies.remove(&key) {
            tracing::debug!(
                "[TopologyStore::remove_topology_record] {}",
                topology.log_str()
            );
            deleted.topologies.insert(key);
        }
    }

    // ----------------------------------------------------------------------------------------
    // Integrity
    // ----------------------------------------------------------------------------------------

    /// Check the structural invariants of the store. Returns one message per violation.
    ///
    /// Not cheap: every reference is resolved.
    pub fn built_in_test(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for link in self.links.values() {
            if link.node_a == link.node_b {
                errors.push(format!(
                    "[TopologyStore::built_in_test] Link {} is self-referential",
                    link.log_str()
                ));
            }
            for endpoint in [link.node_a, link.node_b] {
                if !self.nodes.contains_key(&endpoint) {
                    errors.push(format!(
                        "[TopologyStore::built_in_test] Link {} has missing endpoint [{}]",
                        link.log_str(),
                        endpoint
                    ));
                }
            }
        }
        let owner_refs = self
            .nodes
            .values()
            .map(|n| (n.log_str(), &n.owners))
            .chain(self.links.values().map(|l| (l.log_str(), &l.owners)));
        for (log_str, owners) in owner_refs {
            for owner in owners {
                if !self.institutions.contains_key(owner) {
                    errors.push(format!(
                        "[TopologyStore::built_in_test] {log_str} has missing owner [{owner}]"
                    ));
                }
            }
        }
        let memberships = self
            .institutions
            .values()
            .map(|e| &e.base)
            .chain(self.nodes.values().map(|e| &e.base))
            .chain(self.links.values().map(|e| &e.base));
        for base in memberships {
            for topology in base.topologies.iter() {
                if !self.topologies.contains_key(topology) {
                    errors.push(format!(
                        "[TopologyStore::built_in_test] {} is a member of missing Topology [{}]",
                        base.log_str(),
                        topology
                    ));
                }
            }
        }
        for topology in self.topologies.values() {
            if let Some(owner) = topology.owner {
                if !self.institutions.contains_key(&owner) {
                    errors.push(format!(
                        "[TopologyStore::built_in_test] Topology {} has missing owner [{}]",
                        topology.log_str(),
                        owner
                    ));
                }
            }
            if self
                .topologies
                .values()
                .filter(|t| t.grenml_id == topology.grenml_id)
                .count()
                > 1
            {
                errors.push(format!(
                    "[TopologyStore::built_in_test] Topology GRENML ID {} is not unique",
                    topology.grenml_id
                ));
            }
        }
        if self.topologies.values().filter(|t| t.main).count() > 1 {
            errors.push("[TopologyStore::built_in_test] more than one main Topology".to_string());
        }
        let tree = self.topology_tree();
        for scc in kosaraju_scc(tree.as_graph()).iter() {
            if scc.len() > 1 {
                errors.push(format!(
                    "[TopologyStore::built_in_test] Topology parents contain cycle: {scc:?}"
                ));
            }
        }
        errors
    }
}

fn filter_map<E, P>(map: &BTreeMap<SeqKey, E>, predicate: P) -> Vec<SeqKey>
where
    E: Element,
    P: Fn(&ElementBase) -> bool,
{
    map.iter()
        .filter(|(_, e)| predicate(e.base()))
        .map(|(k, _)| *k)
        .collect()
}
