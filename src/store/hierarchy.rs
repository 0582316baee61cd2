use crate::{
    error::CollationError,
    properties::{ElementKind, SeqKey},
    store::{DeleteSet, TopologyStore},
};
use petgraph::{
    graphmap::GraphMap,
    visit::{depth_first_search, Control, DfsEvent},
    Directed,
};
use std::collections::BTreeSet;

/// Topology parent/child relations as a directed graph. Edges run parent -> child.
#[derive(Debug, Clone, Default)]
pub struct TopologyTree(GraphMap<SeqKey, (), Directed>);

impl TopologyTree {
    pub fn as_graph(&self) -> &GraphMap<SeqKey, (), Directed> {
        &self.0
    }

    pub fn contains(&self, topology: SeqKey) -> bool {
        self.0.contains_node(topology)
    }

    /// Topologies without a parent, ascending.
    pub fn roots(&self) -> Vec<SeqKey> {
        let mut roots: Vec<SeqKey> = self
            .0
            .nodes()
            .filter(|n| {
                self.0
                    .neighbors_directed(*n, petgraph::Direction::Incoming)
                    .next()
                    .is_none()
            })
            .collect();
        roots.sort();
        roots
    }

    pub fn children(&self, topology: SeqKey) -> Vec<SeqKey> {
        let mut children: Vec<SeqKey> = self
            .0
            .neighbors_directed(topology, petgraph::Direction::Outgoing)
            .collect();
        children.sort();
        children
    }

    /// `root` and every descendant, in discovery (pre-)order.
    pub fn subtree(&self, root: SeqKey) -> Vec<SeqKey> {
        let mut visited = Vec::new();
        if !self.contains(root) {
            return visited;
        }
        depth_first_search(&self.0, vec![root], |event| {
            if let DfsEvent::Discover(topology, _) = event {
                visited.push(topology);
            }
            Control::<()>::Continue
        });
        visited
    }

    /// `root` and every descendant with each topology listed after all of its children.
    pub fn postorder(&self, root: SeqKey) -> Vec<SeqKey> {
        let mut finished = Vec::new();
        if !self.contains(root) {
            return finished;
        }
        depth_first_search(&self.0, vec![root], |event| {
            if let DfsEvent::Finish(topology, _) = event {
                finished.push(topology);
            }
            Control::<()>::Continue
        });
        finished
    }
}

impl TopologyStore {
    pub fn topology_tree(&self) -> TopologyTree {
        let mut graph = GraphMap::<SeqKey, (), Directed>::new();
        for topology in self.topologies() {
            graph.add_node(topology.key);
            if let Some(parent) = topology.parent {
                graph.add_edge(parent, topology.key, ());
            }
        }
        TopologyTree(graph)
    }

    pub fn topology_subtree(&self, root: SeqKey) -> Result<BTreeSet<SeqKey>, CollationError> {
        self.require_topology(root)?;
        Ok(self.topology_tree().subtree(root).into_iter().collect())
    }

    /// Everything removed by deleting `root`: the topology and its descendants, every element
    /// belonging to none of the surviving topologies, and the links attached to removed nodes.
    /// Elements that already belong to no topology at all are swept along with them.
    pub fn topology_delete_plan(&self, root: SeqKey) -> Result<DeleteSet, CollationError> {
        let topologies = self.topology_subtree(root)?;
        let orphaned = |kind: ElementKind| -> BTreeSet<SeqKey> {
            self.filter_elements(kind, |base| base.topologies.is_subset(&topologies))
            .into_iter()
            .collect()
        };
        let institutions = orphaned(ElementKind::Institution);
        let nodes = orphaned(ElementKind::Node);
        let mut links = orphaned(ElementKind::Link);
        for node in nodes.iter() {
            links.extend(self.links_of_node(*node));
        }
        Ok(DeleteSet {
            institutions,
            nodes,
            links,
            topologies,
        })
    }

    /// Delete a topology subtree following [TopologyStore::topology_delete_plan]. Links go first,
    /// then Nodes, Institutions and finally the topologies themselves.
    pub fn delete_topology(&mut self, root: SeqKey) -> Result<DeleteSet, CollationError> {
        let plan = self.topology_delete_plan(root)?;
        tracing::debug!(
            "[TopologyStore::delete_topology] deleting {} records under Topology [{}]",
            plan.len(),
            root
        );
        let mut deleted = DeleteSet::default();
        for link in plan.links.iter() {
            self.delete_link(*link, &mut deleted);
        }
        for node in plan.nodes.iter() {
            self.delete_node(*node, &mut deleted);
        }
        for institution in plan.institutions.iter() {
            self.delete_institution(*institution, &mut deleted);
        }
        for topology in plan.topologies.iter() {
            self.remove_topology_record(*topology, &mut deleted);
        }
        self.ensure_main();
        Ok(deleted)
    }
}
