//! HTTP contract of the cluster nodes.

use crate::errors::ReviveResult;
use crate::types::{ClusterMember, NodeAddress, NodeInfo};
use async_trait::async_trait;

/// Read-only HTTP endpoints served by every node process.
///
/// Each call is a single request. Retrying is the caller's business.
#[async_trait]
pub trait NodeHttpEffects: Send + Sync {
    /// `GET /node/info`
    async fn node_info(&self, address: &NodeAddress) -> ReviveResult<NodeInfo>;

    /// `GET /cluster/info`
    async fn cluster_info(&self, address: &NodeAddress) -> ReviveResult<Vec<ClusterMember>>;

    /// `GET /snapshots/{ordinal}`, returning the number of application blocks
    /// the snapshot carries.
    async fn snapshot_data_blocks(&self, address: &NodeAddress, ordinal: u64)
        -> ReviveResult<usize>;

    /// `GET /global-snapshots/{hash}`: whether the peer already holds the
    /// global snapshot.
    async fn global_snapshot_exists(&self, address: &NodeAddress, hash: &str)
        -> ReviveResult<bool>;
}
