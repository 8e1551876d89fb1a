//! Domain types shared by every crate in the workspace.

pub mod layer;
pub mod node;
pub mod record;
pub mod snapshot;
pub mod topology;

pub use layer::Layer;
pub use node::{
    ClusterMember, JoinPeer, NodeAddress, NodeHealth, NodeHealthRecord, NodeIdentity, NodeInfo,
};
pub use record::{
    RestartEpisode, RestartReason, RestartRecord, RestartState, RestartTarget, RestartType,
    StoredRestartRecord,
};
pub use snapshot::{GlobalSnapshotInfo, SnapshotInfo};
pub use topology::ClusterTopology;
