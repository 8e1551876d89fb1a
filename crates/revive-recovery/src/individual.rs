//! Restart of individual nodes and of whole application layers.
//!
//! Peers are always discovered live; nothing here relies on the reference
//! node chosen by an earlier full cluster episode.

use crate::commands::{self, StartMode};
use crate::conditions::IndividualPlan;
use crate::context::RestartContext;
use crate::effects::RestartEffects;
use crate::full_cluster::FullClusterOrchestrator;
use crate::health::HealthProber;
use revive_core::types::NodeHealthRecord;
use revive_core::{Layer, ReferenceNode, ReviveError, ReviveResult};

/// Restarts only what an [`IndividualPlan`] names.
pub struct IndividualOrchestrator<'a, E: RestartEffects> {
    ctx: &'a RestartContext<E>,
    layers: FullClusterOrchestrator<'a, E>,
}

impl<'a, E: RestartEffects> IndividualOrchestrator<'a, E> {
    /// Create an orchestrator bound to `ctx`.
    pub fn new(ctx: &'a RestartContext<E>) -> Self {
        Self {
            ctx,
            layers: FullClusterOrchestrator::new(ctx),
        }
    }

    /// Run every restart in `plan`: whole layers first, then single nodes.
    pub async fn execute(&self, plan: &IndividualPlan, reference: &ReferenceNode) -> ReviveResult<()> {
        for layer in &plan.whole_layers {
            self.restart_layer(*layer, reference).await?;
        }
        for node in &plan.nodes {
            self.restart_node(node, reference).await?;
        }
        Ok(())
    }

    /// Bring a whole application layer back up without touching the others.
    pub async fn restart_layer(&self, layer: Layer, reference: &ReferenceNode) -> ReviveResult<()> {
        if !layer.is_application_layer() {
            return Err(ReviveError::invalid(
                "an L0 outage needs a full cluster restart",
            ));
        }
        tracing::info!(%layer, "restarting whole layer");
        self.layers.bring_up_layer(layer, reference).await
    }

    /// Restart one node on one layer and join it to a live peer.
    pub async fn restart_node(
        &self,
        target: &NodeHealthRecord,
        reference: &ReferenceNode,
    ) -> ReviveResult<()> {
        let config = self.ctx.config();
        let node = config.topology.find_by_ip(&target.ip).ok_or_else(|| {
            ReviveError::invalid(format!("{} is not part of the topology", target.ip))
        })?;
        let layer = target.layer;
        let settings = config.layer(layer)?;
        let ids = [node.id.clone()];

        tracing::info!(node = %target.address(), %layer, state = ?target.state, "restarting node");
        self.ctx
            .dispatch(&ids, commands::stop_layer(settings.public_port), "stop node")
            .await;
        self.layers.archive_logs(&ids, layer).await?;

        let l0_peer = if layer.is_application_layer() {
            Some(self.layers.l0_peer().await?)
        } else {
            None
        };
        self.layers
            .start_node(node, layer, StartMode::Validator, reference, l0_peer.as_ref())
            .await?;

        let prober = HealthProber::new(self.ctx);
        prober.await_started(&target.address()).await?;
        let peer = prober.join_target_excluding(layer, &node.ip).await?;

        self.ctx
            .dispatch(
                &ids,
                commands::join_cluster(settings.cli_port, &peer),
                "join cluster",
            )
            .await;
        Ok(())
    }
}
