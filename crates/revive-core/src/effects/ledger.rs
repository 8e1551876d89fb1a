//! Ledger backend (network information service).

use crate::config::NetworkName;
use crate::errors::ReviveResult;
use crate::types::{GlobalSnapshotInfo, SnapshotInfo};
use async_trait::async_trait;

/// Latest snapshot metadata as published by the network's backend.
#[async_trait]
pub trait LedgerEffects: Send + Sync {
    /// `GET /currency/{cluster_id}/snapshots/latest`
    async fn latest_cluster_snapshot(
        &self,
        network: NetworkName,
        cluster_id: &str,
    ) -> ReviveResult<SnapshotInfo>;

    /// `GET /global-snapshots/latest`
    async fn latest_global_snapshot(&self, network: NetworkName)
        -> ReviveResult<GlobalSnapshotInfo>;
}
