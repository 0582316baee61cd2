//! Delete propagation around a Topology re-import.
//!
//! Every direct member of the Topology is marked dirty before the import writes anything, so
//! the freshly stored copies are the only clean members afterwards. Stale copies then either
//! leave the Topology (when still used elsewhere) or are replaced by their newest same-ID copy,
//! falling back to deletion.

use crate::{
    error::CollationError,
    properties::{ElementKind, ElementRef, SeqKey},
    store::{DeleteSet, ReplaceOptions, TopologyStore},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteStale {
    topology: SeqKey,
}

impl DeleteStale {
    pub fn new(topology: SeqKey) -> Self {
        DeleteStale { topology }
    }

    /// Run `f` between marking and sweeping. When `f` fails the marks are lifted and nothing is
    /// deleted.
    pub fn scope<T, F>(store: &mut TopologyStore, topology: SeqKey, f: F) -> Result<T, CollationError>
    where
        F: FnOnce(&mut TopologyStore) -> Result<T, CollationError>,
    {
        let bracket = DeleteStale::new(topology);
        bracket.mark(store, true)?;
        match f(store) {
            Ok(value) => {
                bracket.delete_dirty(store)?;
                Ok(value)
            }
            Err(e) => {
                tracing::debug!("[DeleteStale::scope] unmarking after failure: {}", e);
                bracket.mark(store, false)?;
                Err(e)
            }
        }
    }

    fn members(&self, store: &TopologyStore) -> Vec<ElementRef> {
        ElementKind::all()
            .iter()
            .flat_map(|kind| {
                store
                    .members_of(*kind, self.topology)
                    .into_iter()
                    .map(|key| ElementRef::new(*kind, key))
            })
            .collect()
    }

    /// Set the dirty flag on every direct member. Returns how many were touched.
    pub fn mark(&self, store: &mut TopologyStore, dirty: bool) -> Result<usize, CollationError> {
        let members = self.members(store);
        for element in members.iter() {
            store.set_dirty(*element, dirty)?;
        }
        tracing::debug!(
            "[DeleteStale::mark] {} member(s) of Topology [{}] set dirty={}",
            members.len(),
            self.topology,
            dirty
        );
        Ok(members.len())
    }

    fn dirty_members(&self, store: &TopologyStore, kind: ElementKind) -> Vec<SeqKey> {
        store.filter_elements(kind, |base| base.dirty && base.topologies.contains(&self.topology))
    }

    /// Sweep dirty members: Links, then Nodes, then Institutions.
    pub fn delete_dirty(&self, store: &mut TopologyStore) -> Result<DeleteSet, CollationError> {
        let mut deleted = DeleteSet::default();
        let mut swept = Vec::new();

        for kind in [ElementKind::Link, ElementKind::Node, ElementKind::Institution] {
            for key in self.dirty_members(store, kind) {
                let element = ElementRef::new(kind, key);
                swept.push(element);
                if !store.contains(element) {
                    continue;
                }
                tracing::debug!("Deleting stale {} {}.", kind, store.log_str(element));
                if let Some((message, dependents)) = still_referenced(store, element) {
                    tracing::error!("{}", message);
                    for dependent in dependents {
                        tracing::debug!("{} is depended on by {}", store.log_str(element), dependent);
                    }
                }
                store.remove_from_topology(element, self.topology)?;
                if !store.require(element)?.topologies.is_empty() {
                    continue;
                }
                deleted.union(self.replace_or_delete(store, element)?);
            }
        }

        // Survivors shared with other Topologies keep no stale mark.
        for element in swept {
            if store.contains(element) {
                store.set_dirty(element, false)?;
            }
        }

        tracing::debug!(
            "[DeleteStale::delete_dirty] Topology [{}]: {} element(s) removed",
            self.topology,
            deleted.len()
        );
        Ok(deleted)
    }

    /// Hand the element's references to its newest same-ID copy, or delete it when there is
    /// none.
    fn replace_or_delete(
        &self,
        store: &mut TopologyStore,
        element: ElementRef,
    ) -> Result<DeleteSet, CollationError> {
        match store.replace_with_newest(element, ReplaceOptions::new(false, false)) {
            Ok(outcome) => {
                tracing::debug!(
                    "[DeleteStale::replace_or_delete] {} replaced by newer {}",
                    element,
                    outcome.survivor
                );
                Ok(outcome.deleted)
            }
            Err(CollationError::NoNewerVersion(_)) => {
                tracing::debug!("[DeleteStale::replace_or_delete] deleting {}", element);
                store.delete_element(element)
            }
            Err(e) => Err(e),
        }
    }
}

/// The integrity error for a stale Node that still ends Links, or a stale Institution that still
/// owns Nodes, Links or Topologies, together with what depends on it.
pub(crate) fn still_referenced(
    store: &TopologyStore,
    element: ElementRef,
) -> Option<(String, Vec<String>)> {
    let name = store.log_str(element);
    let (message, dependents) = match element.kind {
        ElementKind::Link => return None,
        ElementKind::Node => (
            format!("Node {name} still serves as a Link endpoint!"),
            store
                .links_of_node(element.key)
                .into_iter()
                .map(|link| store.log_str(ElementRef::link(link)))
                .collect::<Vec<_>>(),
        ),
        ElementKind::Institution => {
            let (nodes, links) = store.owned_elements(element.key);
            let topologies = store
                .owned_topologies(element.key)
                .into_iter()
                .filter_map(|t| store.topology(t).map(|t| t.log_str()));
            (
                format!("Institution {name} still serves as an owner!"),
                nodes
                    .into_iter()
                    .map(|n| store.log_str(ElementRef::node(n)))
                    .chain(links.into_iter().map(|l| store.log_str(ElementRef::link(l))))
                    .chain(topologies)
                    .collect(),
            )
        }
    };
    (!dependents.is_empty()).then_some((message, dependents))
}
