//! Cluster topology: which machines make up the managed cluster.

use super::node::NodeIdentity;
use serde::{Deserialize, Serialize};

/// Genesis node plus an ordered list of validators.
///
/// Every enabled layer runs on every node, so the same list is used for all
/// layers. Validator order is the order nodes are started and joined in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterTopology {
    /// Primary node: rollback anchor and first join target
    pub genesis: NodeIdentity,
    /// Non-primary members, in bring-up order
    #[serde(default)]
    pub validators: Vec<NodeIdentity>,
}

impl ClusterTopology {
    /// Create a topology.
    pub fn new(genesis: NodeIdentity, validators: Vec<NodeIdentity>) -> Self {
        Self {
            genesis,
            validators,
        }
    }

    /// All nodes, genesis first.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeIdentity> {
        std::iter::once(&self.genesis).chain(self.validators.iter())
    }

    /// Number of nodes running each layer.
    pub fn node_count(&self) -> usize {
        1 + self.validators.len()
    }

    /// Instance ids of all nodes, genesis first.
    pub fn node_ids(&self) -> Vec<String> {
        self.nodes().map(|n| n.id.clone()).collect()
    }

    /// Look a node up by IP.
    pub fn find_by_ip(&self, ip: &str) -> Option<&NodeIdentity> {
        self.nodes().find(|n| n.ip == ip)
    }

    /// Whether `ip` belongs to the genesis node.
    pub fn is_genesis(&self, ip: &str) -> bool {
        self.genesis.ip == ip
    }
}
