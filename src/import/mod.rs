//! Import of parsed GRENML Topology trees into a [TopologyStore].
//!
//! # Module Organization
//!
//! - [`parsed`]: the document shape shared with [crate::export]
//! - [`log`]: the [ImportLog] returned from every import
//! - [`delete_stale`]: delete propagation around each re-imported Topology
//! - [`cross_topology`]: collapsing external placeholders onto their originals
//!
//! An import runs in one store transaction: Topologies children first, then the cross-topology
//! resolver, then the configured Rulesets. Any error rolls the whole import back and aborts the
//! log.

pub mod cross_topology;
pub mod delete_stale;
pub mod log;
pub mod parsed;


pub use cross_topology::{resolve_cross_topology, CrossTopologyReport};
pub use delete_stale::DeleteStale;
pub use log::{ImportKindLog, ImportLog, ImportStatus};
pub use parsed::{ParsedInstitution, ParsedLink, ParsedNode, ParsedProperties, ParsedTopology};

use crate::{
    collation::{ApplyReport, RuleBook},
    config::CollationConfig,
    error::CollationError,
    properties::{
        Element, ElementBase, ElementKind, Institution, Link, Location, Node, Property, SeqKey,
        Topology,
    },
    store::TopologyStore,
};
use std::collections::BTreeMap;

type IdMap = BTreeMap<String, SeqKey>;

fn parsed_properties(properties: &ParsedProperties) -> Vec<Property> {
    properties
        .iter()
        .flat_map(|(name, values)| values.iter().map(move |value| Property::new(name, value)))
        .collect()
}

fn fill_base(
    base: &mut ElementBase,
    short_name: Option<&str>,
    version: &Option<String>,
    properties: &ParsedProperties,
    topology: SeqKey,
    messages: &mut Vec<String>,
) {
    messages.extend(base.set_short_name(short_name));
    base.version = version.clone();
    base.properties = parsed_properties(properties);
    base.topologies.insert(topology);
}

fn location(
    latitude: Option<f64>,
    longitude: Option<f64>,
    altitude: Option<f64>,
    address: Option<&str>,
    unlocode: Option<&str>,
    messages: &mut Vec<String>,
) -> Location {
    let mut location = Location::default();
    location.set_coordinates(latitude, longitude, altitude);
    messages.extend(location.set_address(address));
    messages.extend(location.set_unlocode(unlocode));
    location
}

/// Imports parsed documents into a store, applying a [RuleBook] afterwards.
pub struct Importer<'a> {
    config: &'a CollationConfig,
    rules: Option<&'a RuleBook>,
}

impl<'a> Importer<'a> {
    pub fn new(config: &'a CollationConfig) -> Self {
        Importer {
            config,
            rules: None,
        }
    }

    /// Rulesets to run after the import when the configuration asks for it.
    pub fn with_rules(mut self, rules: &'a RuleBook) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Import `document` as a root Topology, or under `parent` when given.
    ///
    /// Never returns an error: failures abort and are recorded in the returned log, and the
    /// store is left as it was before the call.
    pub fn import(
        &self,
        store: &mut TopologyStore,
        document: &ParsedTopology,
        parent: Option<SeqKey>,
    ) -> ImportLog {
        let mut log = ImportLog::new();
        tracing::info!(
            "Importing Topology tree {} <{}>",
            document.name,
            document.id
        );
        let errors = document.validate();
        if !errors.is_empty() {
            log.abort(&CollationError::ImportAborted(errors.join("; ")));
            return log;
        }

        let result = store.transaction(|store| {
            let root = self.insert_topology(store, &mut log, document, parent)?;
            let cross_topology = if self.config.test_mode {
                None
            } else {
                Some(resolve_cross_topology(store, self.config)?)
            };
            let rules = match self.rules {
                Some(book) if self.config.apply_rules_on_import => Some(book.apply_all(store)),
                _ => None,
            };
            Ok((root, cross_topology, rules))
        });

        match result {
            Ok((root, cross_topology, rules)) => {
                tracing::debug!("[Importer::import] root Topology stored as [{}]", root);
                log.cross_topology = cross_topology;
                log.rules = rules;
                log.finish();
            }
            Err(e) => log.abort(&e),
        }
        log
    }

    fn insert_topology(
        &self,
        store: &mut TopologyStore,
        log: &mut ImportLog,
        parsed: &ParsedTopology,
        parent: Option<SeqKey>,
    ) -> Result<SeqKey, CollationError> {
        let topology = self.save_topology(store, log, parsed, parent)?;
        for child in parsed.topologies.iter() {
            self.insert_topology(store, log, child, Some(topology))?;
        }
        DeleteStale::scope(store, topology, |store| {
            let institutions = self.save_institutions(store, log, parsed, topology)?;
            self.save_topology_owner(store, log, parsed, topology, &institutions)?;
            let nodes = self.save_nodes(store, log, parsed, topology, &institutions)?;
            self.save_links(store, log, parsed, topology, &institutions, &nodes)?;
            Ok(())
        })?;
        Ok(topology)
    }

    fn save_topology(
        &self,
        store: &mut TopologyStore,
        log: &mut ImportLog,
        parsed: &ParsedTopology,
        parent: Option<SeqKey>,
    ) -> Result<SeqKey, CollationError> {
        let mut messages = Vec::new();
        let mut warnings = Vec::new();

        let existing = match store.topology_by_name_and_parent(&parsed.name, parent) {
            Some(found) => {
                messages.push(format!(
                    "Topology {} exists so it will be updated. Topology matched by name and parent.",
                    found.log_str()
                ));
                Some(found.clone())
            }
            None => store.topology_by_grenml_id(&parsed.id).map(|found| {
                messages.push(format!(
                    "Topology {} exists so it will be updated. Topology matched by ID.",
                    found.log_str()
                ));
                found.clone()
            }),
        };
        let mut topology = existing.unwrap_or_default();
        let fresh = Topology::new(&parsed.id, &parsed.name);
        topology.grenml_id = fresh.grenml_id;
        topology.name = fresh.name;
        topology.version = parsed.version.clone();
        topology.properties = parsed_properties(&parsed.properties);

        let circular = match parent {
            Some(p) if topology.key.is_assigned() => {
                store.topology_subtree(topology.key)?.contains(&p)
            }
            _ => false,
        };
        topology.parent = if circular {
            warnings.push("Circular parent reference detected and avoided.".to_string());
            None
        } else {
            parent
        };
        let parent_name = topology
            .parent
            .and_then(|p| store.topology(p))
            .map(|p| p.log_str())
            .unwrap_or_else(|| "None".to_string());
        messages.push(format!("Parent set to {parent_name}."));

        let key = store.save_topology(topology)?;
        log.topologies.log_imported(&parsed.id, key, messages);
        log.topologies.update_log(&parsed.id, None, Vec::new(), warnings);
        Ok(key)
    }

    fn save_institutions(
        &self,
        store: &mut TopologyStore,
        log: &mut ImportLog,
        parsed: &ParsedTopology,
        topology: SeqKey,
    ) -> Result<IdMap, CollationError> {
        let mut ids = IdMap::new();
        for parsed_inst in parsed.institutions.iter() {
            let mut messages = Vec::new();
            let mut institution = Institution::new(&parsed_inst.id, "");
            messages.extend(institution.base.set_name(&parsed_inst.name));
            fill_base(
                &mut institution.base,
                parsed_inst.short_name.as_deref(),
                &parsed_inst.version,
                &parsed_inst.properties,
                topology,
                &mut messages,
            );
            institution.location = location(
                parsed_inst.latitude,
                parsed_inst.longitude,
                parsed_inst.altitude,
                parsed_inst.address.as_deref(),
                parsed_inst.unlocode.as_deref(),
                &mut messages,
            );
            let key = store.insert_institution(institution)?;
            log.institutions.log_imported(&parsed_inst.id, key, messages);
            ids.insert(parsed_inst.id.clone(), key);
        }
        Ok(ids)
    }

    fn save_topology_owner(
        &self,
        store: &mut TopologyStore,
        log: &mut ImportLog,
        parsed: &ParsedTopology,
        topology: SeqKey,
        institutions: &IdMap,
    ) -> Result<(), CollationError> {
        match parsed.primary_owner.as_ref().and_then(|id| institutions.get(id)) {
            Some(owner) => store.set_topology_owner(topology, Some(*owner)),
            None => {
                let warning = format!("No primary owner set on Topology {}.", parsed.id);
                tracing::warn!("{}", warning);
                log.topologies
                    .update_log(&parsed.id, Some(topology), Vec::new(), vec![warning]);
                Ok(())
            }
        }
    }

    fn map_owners(owners: &[String], institutions: &IdMap) -> Result<Vec<SeqKey>, CollationError> {
        owners
            .iter()
            .map(|id| {
                institutions
                    .get(id)
                    .copied()
                    .ok_or_else(|| CollationError::NotFound(format!("owner Institution {id}")))
            })
            .collect()
    }

    fn save_nodes(
        &self,
        store: &mut TopologyStore,
        log: &mut ImportLog,
        parsed: &ParsedTopology,
        topology: SeqKey,
        institutions: &IdMap,
    ) -> Result<IdMap, CollationError> {
        let mut ids = IdMap::new();
        for parsed_node in parsed.nodes.iter() {
            let mut messages = Vec::new();
            let mut node = Node::new(&parsed_node.id, "");
            messages.extend(node.base.set_name(&parsed_node.name));
            fill_base(
                &mut node.base,
                parsed_node.short_name.as_deref(),
                &parsed_node.version,
                &parsed_node.properties,
                topology,
                &mut messages,
            );
            node.location = location(
                parsed_node.latitude,
                parsed_node.longitude,
                parsed_node.altitude,
                parsed_node.address.as_deref(),
                parsed_node.unlocode.as_deref(),
                &mut messages,
            );
            node.lifetime.start = parsed_node.lifetime_start.clone();
            node.lifetime.end = parsed_node.lifetime_end.clone();
            node.owners = Self::map_owners(&parsed_node.owners, institutions)?
                .into_iter()
                .collect();
            let key = store.insert_node(node)?;
            log.nodes.log_imported(&parsed_node.id, key, messages);
            ids.insert(parsed_node.id.clone(), key);
        }
        Ok(ids)
    }

    fn save_links(
        &self,
        store: &mut TopologyStore,
        log: &mut ImportLog,
        parsed: &ParsedTopology,
        topology: SeqKey,
        institutions: &IdMap,
        nodes: &IdMap,
    ) -> Result<(), CollationError> {
        for parsed_link in parsed.links.iter() {
            // The endpoint with the lower GRENML ID becomes node A.
            let endpoints = match parsed_link.nodes.as_slice() {
                [a, b] if a != b => {
                    let (first, second) = if a < b { (a, b) } else { (b, a) };
                    nodes.get(first).copied().zip(nodes.get(second).copied())
                }
                _ => None,
            };
            let Some((node_a, node_b)) = endpoints else {
                let warning = format!(
                    "Link {} did not have exactly two endpoints, so was skipped.",
                    parsed_link.id
                );
                tracing::warn!("{}", warning);
                log.links.log_skipped(&parsed_link.id, vec![warning]);
                continue;
            };

            let mut messages = Vec::new();
            let mut link = Link::new(&parsed_link.id, "", node_a, node_b);
            messages.extend(link.base.set_name(&parsed_link.name));
            fill_base(
                &mut link.base,
                parsed_link.short_name.as_deref(),
                &parsed_link.version,
                &parsed_link.properties,
                topology,
                &mut messages,
            );
            link.lifetime.start = parsed_link.lifetime_start.clone();
            link.lifetime.end = parsed_link.lifetime_end.clone();
            link.owners = Self::map_owners(&parsed_link.owners, institutions)?
                .into_iter()
                .collect();
            tracing::debug!("[Importer::save_links] {}", link.log_str());
            let key = store.insert_link(link)?;
            log.links.log_imported(&parsed_link.id, key, messages);
        }
        Ok(())
    }
}

impl ImportLog {
    /// Rule activity recorded during the import, if Rulesets ran.
    pub fn rule_report(&self) -> Option<&ApplyReport> {
        self.rules.as_ref()
    }

    pub fn imported(&self, kind: ElementKind) -> usize {
        self.kind(kind).imported()
    }
}
