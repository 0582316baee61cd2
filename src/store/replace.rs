use crate::{
    error::CollationError,
    properties::{Element, ElementKind, ElementRef, SeqKey},
    store::{DeleteSet, TopologyStore},
};
use serde::{Deserialize, Serialize};

/// What a replacement carries over from the replaced element to its replacement.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceOptions {
    pub union_topologies: bool,
    pub union_owners: bool,
}

impl ReplaceOptions {
    pub const fn new(union_topologies: bool, union_owners: bool) -> Self {
        ReplaceOptions {
            union_topologies,
            union_owners,
        }
    }

    /// Carry over everything: used by Merge.
    pub const fn union_all() -> Self {
        ReplaceOptions::new(true, true)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaceOutcome {
    pub survivor: ElementRef,
    /// Links removed because rewiring would have made them self-referential, with the log message.
    pub conflicting_links: Vec<(SeqKey, String)>,
    pub deleted: DeleteSet,
}

impl TopologyStore {
    /// Substitute `target` for `source` everywhere `source` is referenced, then delete `source`.
    ///
    /// * Institution: owned Topologies, Nodes and Links switch owner to `target`.
    /// * Node: Links ending at `source` are re-pointed at `target`. A Link whose other end is
    ///   already `target` would loop and is deleted instead.
    /// * Link: nothing references a Link, so only the optional unions apply.
    pub fn replace(
        &mut self,
        source: ElementRef,
        target: SeqKey,
        options: ReplaceOptions,
    ) -> Result<ReplaceOutcome, CollationError> {
        let target_ref = ElementRef::new(source.kind, target);
        if source.key == target {
            return Err(CollationError::SourceIsTarget {
                kind: source.kind,
                name: self.log_str(source),
            });
        }
        let (source_topologies, source_log) = {
            let base = self.require(source)?;
            (base.topologies.clone(), base.log_str())
        };
        let target_log = self.require(target_ref)?.log_str();
        tracing::debug!(
            "[TopologyStore::replace] replacing {} with {} ({:?})",
            source_log,
            target_log,
            options
        );

        let mut deleted = DeleteSet::default();
        let mut conflicting_links = Vec::new();
        match source.kind {
            ElementKind::Institution => {
                for topology in self.owned_topologies(source.key) {
                    self.set_topology_owner(topology, Some(target))?;
                }
                let (nodes, links) = self.owned_elements(source.key);
                for owned in nodes
                    .into_iter()
                    .map(ElementRef::node)
                    .chain(links.into_iter().map(ElementRef::link))
                {
                    self.remove_owner(owned, source.key)?;
                    self.add_owner(owned, target)?;
                }
            }
            ElementKind::Node => {
                for link_key in self.links_of_node(source.key) {
                    let Some(link) = self.link(link_key) else {
                        continue;
                    };
                    let far_end = if link.node_a == source.key {
                        link.node_b
                    } else {
                        link.node_a
                    };
                    if far_end == target {
                        let msg = format!(
                            "Link {} has been deleted due to a Node endpoint conflict!",
                            link.log_str()
                        );
                        tracing::error!("{}", msg);
                        self.delete_link(link_key, &mut deleted);
                        conflicting_links.push((link_key, msg));
                        continue;
                    }
                    if let Some(link) = self.link_mut(link_key) {
                        if link.node_a == source.key {
                            link.node_a = target;
                        }
                        if link.node_b == source.key {
                            link.node_b = target;
                        }
                    }
                }
            }
            ElementKind::Link => {}
        }

        if options.union_topologies {
            for topology in source_topologies {
                self.add_to_topology(target_ref, topology)?;
            }
        }
        if options.union_owners && source.kind != ElementKind::Institution {
            for owner in self.owners_of(source) {
                self.add_owner(target_ref, owner)?;
            }
        }

        deleted.union(self.delete_element(source)?);
        Ok(ReplaceOutcome {
            survivor: target_ref,
            conflicting_links,
            deleted,
        })
    }

    /// The most recently stored element of `kind` carrying `grenml_id`.
    pub fn newest_with_grenml_id(&self, kind: ElementKind, grenml_id: &str) -> Option<SeqKey> {
        self.with_grenml_id(kind, grenml_id).into_iter().max()
    }

    /// Replace `source` with the newest element sharing its GRENML ID that was stored after it.
    pub fn replace_with_newest(
        &mut self,
        source: ElementRef,
        options: ReplaceOptions,
    ) -> Result<ReplaceOutcome, CollationError> {
        let base = self.require(source)?;
        let newer = self
            .with_grenml_id(source.kind, &base.grenml_id)
            .into_iter()
            .filter(|key| *key > source.key)
            .max();
        match newer {
            Some(target) => self.replace(source, target, options),
            None => Err(CollationError::NoNewerVersion(base.log_str())),
        }
    }
}
