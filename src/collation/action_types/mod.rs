//! Action handlers run on each element a Rule matched.
//!
//! # Module Organization
//!
//! - [`delete`]: outright deletion
//! - [`property`]: property removal, by name or by tag value
//! - [`keep_newest`]: collapse every same-GRENML-ID element into the newest one
//! - [`dedup`]: Merge and Replace, which resolve a single explicit target first
//!
//! Every handler returns an [ActionOutcome] telling the Rule engine whether to keep threading
//! an element through the rest of the Action chain, plus an [ActionLog].

mod dedup;
mod delete;
mod keep_newest;
mod property;

pub use dedup::{merge_properties, resolve_target};

use crate::{
    collation::{model::Info, report::ActionLog},
    error::CollationError,
    properties::{ElementKind, ElementRef, SeqKey},
    store::TopologyStore,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
};

pub use crate::collation::match_types::{ID_KEY, TOPOLOGY_ID_KEY};

pub const PROPERTY_NAME_KEY: &str = "name";
pub const PROPERTY_VALUE_KEY: &str = "value";

/// Every supported ActionType, by name.
pub static ACTION_TYPES: Lazy<BTreeMap<String, ActionType>> = Lazy::new(|| {
    ActionType::all()
        .into_iter()
        .map(|action_type| (action_type.name(), action_type))
        .collect()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ActionType {
    Delete(ElementKind),
    DeleteProperty(ElementKind),
    DeleteTagProperty(ElementKind),
    KeepNewest(ElementKind),
    MergeInto(ElementKind),
    ReplaceWith(ElementKind),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The element was deleted and nothing took its place.
    Deleted,
    /// A resolution error left the element untouched.
    Aborted(String),
}

/// Whether the Action chain continues for a matched element, and with which element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionOutcome {
    Continue(SeqKey),
    Stopped(StopReason),
}

impl ActionType {
    /// Tag properties are only deleted from Nodes and Links.
    pub fn all() -> Vec<ActionType> {
        ElementKind::all()
            .iter()
            .flat_map(|kind| {
                [
                    ActionType::Delete(*kind),
                    ActionType::DeleteProperty(*kind),
                    ActionType::DeleteTagProperty(*kind),
                    ActionType::KeepNewest(*kind),
                    ActionType::MergeInto(*kind),
                    ActionType::ReplaceWith(*kind),
                ]
            })
            .filter(ActionType::is_supported)
            .collect()
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, ActionType::DeleteTagProperty(ElementKind::Institution))
    }

    pub fn from_name(name: &str) -> Option<ActionType> {
        ACTION_TYPES.get(name).copied()
    }

    pub fn element_kind(&self) -> ElementKind {
        match self {
            ActionType::Delete(kind)
            | ActionType::DeleteProperty(kind)
            | ActionType::DeleteTagProperty(kind)
            | ActionType::KeepNewest(kind)
            | ActionType::MergeInto(kind)
            | ActionType::ReplaceWith(kind) => *kind,
        }
    }

    pub fn name(&self) -> String {
        match self {
            ActionType::Delete(kind) => format!("Delete {kind}"),
            ActionType::DeleteProperty(kind) => format!("Delete {kind} Property"),
            ActionType::DeleteTagProperty(kind) => format!("Delete {kind} Tag Property"),
            ActionType::KeepNewest(kind) => format!("Keep Newest {kind}"),
            ActionType::MergeInto(kind) => format!("Merge into {kind}"),
            ActionType::ReplaceWith(kind) => format!("Replace with {kind}"),
        }
    }

    pub fn required_info(&self) -> &'static [&'static str] {
        match self {
            ActionType::Delete(_) | ActionType::KeepNewest(_) => &[],
            ActionType::DeleteProperty(_) => &[PROPERTY_NAME_KEY],
            ActionType::DeleteTagProperty(_) => &[PROPERTY_VALUE_KEY],
            ActionType::MergeInto(_) | ActionType::ReplaceWith(_) => &[ID_KEY],
        }
    }

    pub fn optional_info(&self) -> &'static [&'static str] {
        match self {
            ActionType::DeleteProperty(_) => &[PROPERTY_VALUE_KEY],
            ActionType::MergeInto(_) | ActionType::ReplaceWith(_) => &[TOPOLOGY_ID_KEY],
            _ => &[],
        }
    }

    /// Run this Action on `element`.
    ///
    /// Resolution failures are reported through the returned [ActionLog] with
    /// [StopReason::Aborted]; only unexpected store errors come back as `Err`.
    pub fn apply(
        &self,
        store: &mut TopologyStore,
        element: SeqKey,
        infos: &[Info],
    ) -> Result<(ActionOutcome, ActionLog), CollationError> {
        let element = ElementRef::new(self.element_kind(), element);
        let mut log = ActionLog::new(self.name(), element, store.log_str(element));
        let outcome = match self {
            ActionType::Delete(_) => delete::apply(store, element, &mut log)?,
            ActionType::DeleteProperty(_) => property::apply(store, element, infos, false, &mut log)?,
            ActionType::DeleteTagProperty(_) => property::apply(store, element, infos, true, &mut log)?,
            ActionType::KeepNewest(_) => keep_newest::apply(store, element, &mut log)?,
            ActionType::MergeInto(_) => dedup::merge(store, element, infos, &mut log)?,
            ActionType::ReplaceWith(_) => dedup::replace(store, element, infos, &mut log)?,
        };
        Ok((outcome, log))
    }
}

/// `element` and, for a Node, the Links ending at it: what a replacement or deletion touches.
pub(crate) fn with_attached_links(store: &TopologyStore, element: ElementRef) -> Vec<ElementRef> {
    let mut touched = vec![element];
    if element.kind == ElementKind::Node {
        touched.extend(store.links_of_node(element.key).into_iter().map(ElementRef::link));
    }
    touched
}

impl Display for ActionType {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl From<ActionType> for String {
    fn from(value: ActionType) -> Self {
        value.name()
    }
}

impl TryFrom<String> for ActionType {
    type Error = CollationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ActionType::from_name(&value).ok_or(CollationError::UnsupportedActionType {
            action: String::new(),
            name: value,
        })
    }
}
