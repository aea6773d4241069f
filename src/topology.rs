//! Neighbor topology view
//!
//! Derived once from the cluster-wide adjacency map and immutable after
//! that. Broadcasts that arrive before the topology event see an empty
//! neighbor set and simply fan out to nobody; anti-entropy or re-delivery
//! covers them once neighbors are known.
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use tracing::info;

use crate::node::NodeId;

#[derive(Debug, Default)]
pub struct TopologyView {
    neighbors: RwLock<Option<HashSet<NodeId>>>,
}

impl TopologyView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive this node's neighbor set from the adjacency map.
    ///
    /// Returns false (and leaves the view untouched) if the topology was
    /// already configured; the view is set exactly once.
    pub fn configure(
        &self,
        adjacency: &HashMap<NodeId, Vec<NodeId>>,
        self_id: &NodeId,
    ) -> bool {
        let derived: HashSet<NodeId> = adjacency
            .get(self_id)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        self.set_once(derived, self_id)
    }

    /// Full-mesh fallback: every known node except self becomes a neighbor.
    /// Used when no explicit adjacency entry exists for this node.
    pub fn configure_mesh(&self, all_nodes: &[NodeId], self_id: &NodeId) -> bool {
        let derived: HashSet<NodeId> = all_nodes
            .iter()
            .filter(|id| *id != self_id)
            .cloned()
            .collect();
        self.set_once(derived, self_id)
    }

    fn set_once(&self, derived: HashSet<NodeId>, self_id: &NodeId) -> bool {
        let mut guard = match self.neighbors.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.is_some() {
            return false;
        }
        info!(
            "[Node<{}>] Topology configured with {} neighbors",
            self_id,
            derived.len()
        );
        *guard = Some(derived);
        true
    }

    /// The configured neighbor set; empty before configuration.
    pub fn neighbors(&self) -> Vec<NodeId> {
        let guard = match self.neighbors.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .as_ref()
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_configured(&self) -> bool {
        let guard = match self.neighbors.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.is_some()
    }
}
