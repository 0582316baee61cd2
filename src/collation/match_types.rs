use crate::{
    collation::model::{require_info, Info},
    error::CollationError,
    properties::{ElementBase, ElementKind, ElementRef, SeqKey},
    store::TopologyStore,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
};

pub const ID_KEY: &str = "ID";
pub const TOPOLOGY_ID_KEY: &str = "Topology ID";

/// Every supported MatchType, by name.
pub static MATCH_TYPES: Lazy<BTreeMap<String, MatchType>> = Lazy::new(|| {
    MatchType::all()
        .into_iter()
        .map(|match_type| (match_type.name(), match_type))
        .collect()
});

/// A filter narrowing a candidate set of one element kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MatchType {
    /// Elements whose GRENML ID equals the `ID` parameter.
    ById(ElementKind),
    /// Members of the Topology whose GRENML ID equals the `Topology ID` parameter.
    ByTopology(ElementKind),
    /// Elements whose GRENML ID occurs more than once among the candidates. Every occurrence
    /// is kept.
    ByIdDuplicate(ElementKind),
}

impl MatchType {
    pub fn all() -> Vec<MatchType> {
        ElementKind::all()
            .iter()
            .flat_map(|kind| {
                [
                    MatchType::ById(*kind),
                    MatchType::ByTopology(*kind),
                    MatchType::ByIdDuplicate(*kind),
                ]
            })
            .collect()
    }

    pub fn from_name(name: &str) -> Option<MatchType> {
        MATCH_TYPES.get(name).copied()
    }

    pub fn element_kind(&self) -> ElementKind {
        match self {
            MatchType::ById(kind) | MatchType::ByTopology(kind) | MatchType::ByIdDuplicate(kind) => {
                *kind
            }
        }
    }

    pub fn name(&self) -> String {
        match self {
            MatchType::ById(kind) => format!("Match {} by ID", kind.plural()),
            MatchType::ByTopology(kind) => format!("Match {} by Topology", kind.plural()),
            MatchType::ByIdDuplicate(kind) => format!("Match Duplicate {}", kind.plural()),
        }
    }

    pub fn required_info(&self) -> &'static [&'static str] {
        match self {
            MatchType::ById(_) => &[ID_KEY],
            MatchType::ByTopology(_) => &[TOPOLOGY_ID_KEY],
            MatchType::ByIdDuplicate(_) => &[],
        }
    }

    /// Narrow `candidates` (keys of [MatchType::element_kind] elements) to the matching subset.
    /// Candidate order is preserved.
    pub fn filter(
        &self,
        store: &TopologyStore,
        candidates: &[SeqKey],
        infos: &[Info],
    ) -> Result<Vec<SeqKey>, CollationError> {
        let kind = self.element_kind();
        let matched = match self {
            MatchType::ById(_) => {
                let id = require_info(infos, ID_KEY)?;
                narrow(store, kind, candidates, |base| base.grenml_id == id)
            }
            MatchType::ByTopology(_) => {
                let topology_id = require_info(infos, TOPOLOGY_ID_KEY)?;
                match store.topology_by_grenml_id(topology_id) {
                    Some(topology) => narrow(store, kind, candidates, |base| {
                        base.topologies.contains(&topology.key)
                    }),
                    None => {
                        tracing::debug!(
                            "[MatchType::filter] no Topology with GRENML ID {}",
                            topology_id
                        );
                        Vec::new()
                    }
                }
            }
            MatchType::ByIdDuplicate(_) => {
                let mut counts = BTreeMap::<&str, usize>::new();
                for key in candidates.iter() {
                    if let Some(base) = store.element(ElementRef::new(kind, *key))
                    {
                        *counts.entry(base.grenml_id.as_str()).or_default() += 1;
                    }
                }
                narrow(store, kind, candidates, |base| {
                    counts.get(base.grenml_id.as_str()).is_some_and(|n| *n > 1)
                })
            }
        };
        tracing::debug!(
            "[MatchType::filter] {}: {} of {} candidates matched",
            self,
            matched.len(),
            candidates.len()
        );
        Ok(matched)
    }
}

/// Keep the candidates whose stored element satisfies `predicate`.
fn narrow<P>(store: &TopologyStore, kind: ElementKind, candidates: &[SeqKey], predicate: P) -> Vec<SeqKey>
where
    P: Fn(&ElementBase) -> bool,
{
    candidates
        .iter()
        .copied()
        .filter(|key| {
            store
                .element(ElementRef::new(kind, *key))
                .is_some_and(&predicate)
        })
        .collect()
}

impl Display for MatchType {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl From<MatchType> for String {
    fn from(value: MatchType) -> Self {
        value.name()
    }
}

impl TryFrom<String> for MatchType {
    type Error = CollationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        MatchType::from_name(&value).ok_or(CollationError::UnsupportedMatchType {
            criterion: String::new(),
            name: value,
        })
    }
}
