//! Collapse external placeholders onto the elements they were exported from.
//!
//! An exported Topology carries copies of owners and endpoints that live in other Topologies,
//! each tagged with a Property naming those Topologies. Re-importing such a document would
//! otherwise leave a duplicate behind for every external reference.

use crate::{
    config::CollationConfig,
    error::CollationError,
    properties::{ElementKind, ElementRef, SeqKey},
    store::{ReplaceOptions, TopologyStore},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedExternal {
    pub placeholder: ElementRef,
    pub original: ElementRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbiguousExternal {
    pub placeholder: ElementRef,
    pub candidates: Vec<SeqKey>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossTopologyReport {
    pub resolved: Vec<ResolvedExternal>,
    pub ambiguous: Vec<AmbiguousExternal>,
    pub unresolved: Vec<ElementRef>,
}

/// Topology keys named by an external-origin Property value. Unknown GRENML IDs are ignored.
fn listed_topologies(store: &TopologyStore, value: &str, delimiter: &str) -> BTreeSet<SeqKey> {
    value
        .split(delimiter)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .filter_map(|id| store.topology_by_grenml_id(id).map(|t| t.key))
        .collect()
}

/// Elements of `kind` sharing `placeholder`'s GRENML ID inside one of the listed Topologies.
pub fn find_originals(
    store: &TopologyStore,
    placeholder: ElementRef,
    config: &CollationConfig,
) -> Result<Vec<SeqKey>, CollationError> {
    let base = store.require(placeholder)?;
    let topologies: BTreeSet<SeqKey> = base
        .property_values(&config.external_property_key)
        .flat_map(|value| listed_topologies(store, value, &config.external_property_delimiter))
        .collect();
    Ok(store.filter_elements(placeholder.kind, |candidate| {
        candidate.key != placeholder.key
            && candidate.grenml_id == base.grenml_id
            && !candidate.topologies.is_disjoint(&topologies)
    }))
}

/// Replace every external placeholder that has exactly one original, Institutions first.
pub fn resolve_cross_topology(
    store: &mut TopologyStore,
    config: &CollationConfig,
) -> Result<CrossTopologyReport, CollationError> {
    let mut report = CrossTopologyReport::default();
    for kind in [ElementKind::Institution, ElementKind::Node] {
        let placeholders = store.filter_elements(kind, |base| {
            base.property_values(&config.external_property_key)
                .next()
                .is_some()
        });
        tracing::debug!(
            "[resolve_cross_topology] {} external {} found",
            placeholders.len(),
            kind.plural()
        );
        for key in placeholders {
            let placeholder = ElementRef::new(kind, key);
            if !store.contains(placeholder) {
                continue;
            }
            let originals = find_originals(store, placeholder, config)?;
            match originals.as_slice() {
                [] => {
                    tracing::debug!(
                        "Not removing external {} {} as no originals found in the listed Topologies.",
                        kind,
                        store.log_str(placeholder)
                    );
                    report.unresolved.push(placeholder);
                }
                [original] => {
                    tracing::debug!(
                        "Removing external {} {} in favour of {}",
                        kind,
                        store.log_str(placeholder),
                        store.log_str(ElementRef::new(kind, *original))
                    );
                    let outcome =
                        store.replace(placeholder, *original, ReplaceOptions::new(false, false))?;
                    report.resolved.push(ResolvedExternal {
                        placeholder,
                        original: outcome.survivor,
                    });
                }
                many => {
                    let names: Vec<String> = many
                        .iter()
                        .map(|k| store.log_str(ElementRef::new(kind, *k)))
                        .collect();
                    tracing::error!(
                        "Replacing {} {}; found {}: [{}]",
                        kind,
                        store.log_str(placeholder),
                        many.len(),
                        names.join(", ")
                    );
                    report.ambiguous.push(AmbiguousExternal {
                        placeholder,
                        candidates: many.to_vec(),
                    });
                }
            }
        }
    }
    Ok(report)
}
