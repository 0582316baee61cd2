//! # grenml-collation
//!
//! Reconciliation of overlapping GRENML network topology imports.
//!
//! ## Overview
//!
//! Research and education networks publish their topologies (Institutions, Nodes and Links
//! grouped into a Topology tree) independently. The same physical element is often described
//! by several contributors, and each re-import of a Topology brings a fresh copy of everything
//! in it. grenml-collation keeps one [`store::TopologyStore`] consistent as those documents
//! arrive:
//!
//! - **Replacement**: hand every reference held by one element to another, then delete it
//! - **Rules**: declarative, priority-ordered Rulesets that match elements and act on them
//! - **Cross-topology resolution**: fold exported placeholders back onto their originals
//! - **Delete propagation**: drop what a re-imported Topology no longer asserts
//!
//! ## Architecture
//!
//! - **[`properties`]**: element, Topology and Property types, keyed by [`properties::SeqKey`]
//! - **[`store`]**: the in-memory entity store, Topology hierarchy and the replace primitive
//! - **[`collation`]**: match types, action types, the rule engine and its reports
//! - **[`import`]**: parsed documents in, with delete propagation and cross-topology resolution
//! - **[`export`]**: Topology trees out, as self-contained parsed documents
//! - **[`config`]**: TOML configuration and the global provider hook
//! - **[`session`]**: a store, RuleBook and config bundled for hosts
//! - **[`commands`]**: the `Op`/`OpResult` command interface
//!
//! ## Quick Start
//!
//! ```rust
//! use grenml_collation::{
//!     config::CollationConfig,
//!     import::{ParsedInstitution, ParsedTopology},
//!     session::CollationSession,
//! };
//!
//! let mut session = CollationSession::new(CollationConfig::default()).unwrap();
//!
//! let mut document = ParsedTopology::new("t1", "Backbone");
//! document.primary_owner = Some("i1".to_string());
//! document.institutions.push(ParsedInstitution::new("i1", "Institution One"));
//!
//! // Importing twice leaves one copy: the stale one is replaced by the fresh one.
//! session.import(&document, None);
//! let log = session.import(&document, None);
//! assert!(log.errors.is_empty());
//! assert_eq!(session.store.institutions().count(), 1);
//! ```
//!
//! ## Features
//!
//! - **default**: the library
//! - **bin**: the `grenml-collate` CLI (`clap`, `tracing-subscriber`)

pub mod collation;
pub mod commands;
pub mod config;
pub mod error;
pub mod export;
pub mod import;
pub mod properties;
pub mod session;
pub mod store;

pub use error::*;
