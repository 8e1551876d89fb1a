//! Snapshot production monitoring and reference node selection.

use crate::context::RestartContext;
use crate::effects::RestartEffects;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use revive_core::types::{NodeAddress, SnapshotInfo};
use revive_core::{Layer, ReferenceNode, ReviveError, ReviveResult};

/// Watches the ledger for snapshot progress.
pub struct SnapshotMonitor<'a, E: RestartEffects> {
    ctx: &'a RestartContext<E>,
}

impl<'a, E: RestartEffects> SnapshotMonitor<'a, E> {
    /// Create a monitor bound to `ctx`.
    pub fn new(ctx: &'a RestartContext<E>) -> Self {
        Self { ctx }
    }

    /// Latest snapshot of the managed cluster.
    pub async fn last_snapshot(&self) -> ReviveResult<SnapshotInfo> {
        self.ctx
            .effects()
            .latest_cluster_snapshot(self.ctx.network(), self.ctx.cluster_id())
            .await
    }

    /// Whether `snapshot` is older than the stall threshold at `now`.
    pub fn has_stalled(&self, snapshot: &SnapshotInfo, now: DateTime<Utc>) -> bool {
        snapshot.age_minutes(now) > self.ctx.policy().stall_threshold_minutes
    }

    /// Fetch the latest snapshot and check it against the stall threshold.
    pub async fn snapshots_stalled(&self) -> ReviveResult<bool> {
        let snapshot = self.last_snapshot().await?;
        let now = self.ctx.effects().now().await;
        let stalled = self.has_stalled(&snapshot, now);
        if stalled {
            tracing::warn!(
                ordinal = snapshot.ordinal,
                age_minutes = snapshot.age_minutes(now),
                threshold = self.ctx.policy().stall_threshold_minutes,
                "snapshot production stalled"
            );
        }
        Ok(stalled)
    }

    /// Whether none of the last few cluster snapshots carries application
    /// blocks, read from the genesis L0 node.
    ///
    /// Snapshots that cannot be read count as empty.
    pub async fn data_layer_stalled(&self) -> ReviveResult<bool> {
        let last = self.last_snapshot().await?;
        let window = self.ctx.policy().data_snapshot_window.max(1);
        let first = last.ordinal.saturating_sub(window - 1);
        let genesis = NodeAddress::new(
            self.ctx.config().topology.genesis.ip.clone(),
            self.ctx.config().public_port(Layer::L0)?,
        );
        let genesis = &genesis;
        let effects = self.ctx.effects();

        let counts = join_all((first..=last.ordinal).map(|ordinal| async move {
            match effects.snapshot_data_blocks(genesis, ordinal).await {
                Ok(blocks) => blocks,
                Err(err) => {
                    tracing::debug!(ordinal, error = %err, "snapshot unreadable");
                    0
                }
            }
        }))
        .await;

        let stalled = counts.iter().all(|blocks| *blocks == 0);
        if stalled {
            tracing::warn!(
                from = first,
                to = last.ordinal,
                "no data application blocks in recent snapshots"
            );
        }
        Ok(stalled)
    }

    /// First reference node, in priority order, that already holds the
    /// latest global snapshot.
    ///
    /// Fatal when none does; nothing destructive may happen without one.
    pub async fn select_reference_node(&self) -> ReviveResult<ReferenceNode> {
        let global = self
            .ctx
            .effects()
            .latest_global_snapshot(self.ctx.network())
            .await?;

        for node in self.ctx.config().reference_nodes()? {
            let address = NodeAddress::new(node.ip.clone(), node.port);
            match self
                .ctx
                .effects()
                .global_snapshot_exists(&address, &global.hash)
                .await
            {
                Ok(true) => {
                    tracing::info!(
                        node = %address,
                        ordinal = global.ordinal,
                        "reference node selected"
                    );
                    return Ok(node);
                }
                Ok(false) => {
                    tracing::debug!(node = %address, "reference node lacks latest global snapshot");
                }
                Err(err) => {
                    tracing::warn!(node = %address, error = %err, "reference node probe failed");
                }
            }
        }

        Err(ReviveError::not_found(format!(
            "no reference node on {} holds global snapshot {}",
            self.ctx.network(),
            global.hash
        )))
    }
}
