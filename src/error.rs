use std::{fmt, io};

use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;

use crate::properties::ElementKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum CollationError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Custom error: {0}")]
    Custom(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("Entity store error: {0}")]
    Store(String),

    // Rule configuration (validation) errors
    #[error("No MatchCriteria associated to Rule {0}.")]
    NoMatchCriteria(String),
    #[error("No Actions associated to Rule {0}.")]
    NoActions(String),
    #[error("Rule {0} has MatchCriteria and Actions with different element_types")]
    ConflictingElementKinds(String),
    #[error(
        "This Rule's {match_type} Match Criterion must include exactly one Match Info for each \
         of these keys: {required}"
    )]
    IncorrectMatchInfos { match_type: String, required: String },
    #[error(
        "This Rule's {action_type} Action must include exactly one Action Info for each of \
         these keys: {required}"
    )]
    IncorrectActionInfos { action_type: String, required: String },
    #[error("MatchCriterion {criterion} has unsupported MatchType with name \"{name}\"")]
    UnsupportedMatchType { criterion: String, name: String },
    #[error("Action {action} has unsupported ActionType with name \"{name}\"")]
    UnsupportedActionType { action: String, name: String },

    // Resolution errors raised while applying an Action
    #[error("Could not find the substitute {0}.")]
    NoSubstitute(ElementKind),
    #[error("Found too many substitute {0} elements.")]
    MultipleSubstitutes(ElementKind),
    #[error("{kind} \"{name}\" is both target and replacement/merge_into.")]
    SourceIsTarget { kind: ElementKind, name: String },
    #[error("Links \"{target}\" and \"{replacement}\" have different endpoints.")]
    DifferentEndpoints { target: String, replacement: String },
    #[error("No newer version of {0} found.")]
    NoNewerVersion(String),

    // Structural errors
    #[error("Link {0} must have two distinct endpoint Nodes")]
    InvalidLinkEndpoints(String),
    #[error("Cannot create circular Topology reference: {0}")]
    CircularTopology(String),
    #[error("Topology GRENML ID must be supplied and unique: {0}")]
    DuplicateTopologyId(String),
    #[error("More than one Topology is marked as main")]
    MultipleMainTopologies,
    #[error("No root Topology available for export")]
    MissingRootTopology,
    #[error("Topology {0} must have at least one owner to export.")]
    NoTopologyOwner(String),
    #[error("Import aborted: {0}")]
    ImportAborted(String),
    #[error("Ruleset document could not be parsed: {0}")]
    RulesetParse(String),
}

impl CollationError {
    /// Errors detected by Rule validation. A Rule raising one of these is skipped, never applied.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CollationError::NoMatchCriteria(_)
                | CollationError::NoActions(_)
                | CollationError::ConflictingElementKinds(_)
                | CollationError::IncorrectMatchInfos { .. }
                | CollationError::IncorrectActionInfos { .. }
                | CollationError::UnsupportedMatchType { .. }
                | CollationError::UnsupportedActionType { .. }
        )
    }

    /// Errors that abort a single Action chain for one matched element.
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            CollationError::NoSubstitute(_)
                | CollationError::MultipleSubstitutes(_)
                | CollationError::SourceIsTarget { .. }
                | CollationError::DifferentEndpoints { .. }
        )
    }
}

impl From<toml::de::Error> for CollationError {
    fn from(src: toml::de::Error) -> CollationError {
        CollationError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for CollationError {
    fn from(src: toml::ser::Error) -> CollationError {
        CollationError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for CollationError {
    fn from(src: JsonError) -> CollationError {
        CollationError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<uuid::Error> for CollationError {
    fn from(src: uuid::Error) -> CollationError {
        CollationError::Serialization(format!("UUID conversion failed: {src}"))
    }
}

impl From<io::Error> for CollationError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => CollationError::NotFound(format!("{x}")),
            _ => CollationError::Io(format!("IOError: {}: {x}", x.kind())),
        }
    }
}

impl From<fmt::Error> for CollationError {
    fn from(x: fmt::Error) -> Self {
        CollationError::Custom(format!("{x}"))
    }
}
