//! Collation: declarative, rule-driven reconciliation of a [crate::store::TopologyStore].
//!
//! A [RuleBook] holds priority-ordered [Ruleset]s. Each [Rule] narrows one element kind with a
//! chain of [MatchCriterion]s, then threads every matched element through its [Action]s.
//!
//! # Module Organization
//!
//! - [`model`]: Ruleset/Rule/MatchCriterion/Action configuration and the [RuleBook]
//! - [`match_types`]: the [MatchType] registry and candidate filters
//! - [`action_types`]: the [ActionType] registry and handlers
//! - [`engine`]: validation, ordered application and failure isolation
//! - [`report`]: activity logs and apply reports
//! - [`defaults`]: the built-in ID collision resolution Rulesets
//! - [`transfer`]: bulk JSON export/import of Rulesets
//!
//! ```rust
//! use grenml_collation::collation::RuleBook;
//! use grenml_collation::properties::{Institution, Topology};
//! use grenml_collation::store::TopologyStore;
//!
//! let mut store = TopologyStore::new();
//! let topology = store.save_topology(Topology::new("t1", "Backbone")).unwrap();
//! for name in ["First", "Second"] {
//!     let mut inst = Institution::new("i1", name);
//!     inst.base.topologies.insert(topology);
//!     store.insert_institution(inst).unwrap();
//! }
//! let rules = RuleBook::with_defaults().unwrap();
//! let report = rules.apply_all(&mut store);
//! assert_eq!(store.institutions().count(), 1);
//! assert_eq!(store.institutions().next().unwrap().base.name, "Second");
//! assert!(!report.rules.is_empty());
//! ```

pub mod action_types;
pub mod defaults;
pub mod engine;
pub mod match_types;
pub mod model;
pub mod report;
pub mod transfer;

#[cfg(test)]
mod tests;

pub use action_types::{ActionOutcome, ActionType, StopReason};
pub use engine::{apply_rule, apply_ruleset, validate_rule, RuleHealth, RulesetHealth};
pub use match_types::MatchType;
pub use model::{Action, Info, MatchCriterion, Rule, RuleBook, RuleId, Ruleset, RulesetId};
pub use report::{ActionLog, AffectedElements, ApplyReport, RuleLog, RuleOutcome, RuleReport, RuleStatus};
pub use transfer::{export_rulesets, import_rulesets, TransferResult};
