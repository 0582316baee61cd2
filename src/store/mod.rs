//! Store module: the entity store holding Institutions, Nodes, Links and Topologies.
//!
//! # Module Organization
//!
//! - [`base`]: [`TopologyStore`] itself, with create/filter/mutate/delete and transactions
//! - [`hierarchy`]: the Topology tree ([`TopologyTree`]) and cascade deletion planning
//! - [`replace`]: the replacement primitive shared by actions, the cross-topology resolver and
//!   delete propagation
//!
//! ```rust
//! use grenml_collation::properties::{Institution, Topology};
//! use grenml_collation::store::TopologyStore;
//!
//! let mut store = TopologyStore::new();
//! let topology = store.save_topology(Topology::new("t1", "Backbone")).unwrap();
//! let mut inst = Institution::new("i1", "Example REN");
//! inst.base.topologies.insert(topology);
//! let key = store.insert_institution(inst).unwrap();
//! assert_eq!(store.main_topology().unwrap(), Some(topology));
//! assert!(store.institution(key).is_some());
//! ```

mod base;
mod hierarchy;
mod replace;


pub use base::{DeleteSet, TopologyStore};
pub use hierarchy::TopologyTree;
pub use replace::{ReplaceOptions, ReplaceOutcome};
