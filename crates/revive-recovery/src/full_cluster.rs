//! Full cluster rollback.
//!
//! Two phases, each driven by a separate invocation:
//!
//! 1. **Rollback**: kill every layer on every node, move unacknowledged
//!    snapshots aside, archive logs, then start genesis L0 in rollback mode
//!    against the reference source node.
//! 2. **Join**: once genesis L0 is Ready, bring up every validator on L0 and
//!    then each enabled application layer, one layer at a time. Each
//!    validator is started, polled until it answers, and only then asked to
//!    join.
//!
//! All commands are fire-and-forget; readiness is confirmed by probing.

use crate::commands::{self, L0Peer, StartMode, StartSpec};
use crate::context::RestartContext;
use crate::effects::RestartEffects;
use crate::health::HealthProber;
use crate::snapshots::SnapshotMonitor;
use revive_core::types::{JoinPeer, NodeAddress, NodeIdentity};
use revive_core::{Layer, ReferenceNode, ReviveResult};

/// Drives the rollback and join phases of a full cluster restart, and the
/// layer bring-up shared with individual restarts.
pub struct FullClusterOrchestrator<'a, E: RestartEffects> {
    ctx: &'a RestartContext<E>,
}

impl<'a, E: RestartEffects> FullClusterOrchestrator<'a, E> {
    /// Create an orchestrator bound to `ctx`.
    pub fn new(ctx: &'a RestartContext<E>) -> Self {
        Self { ctx }
    }

    fn genesis(&self) -> &'a NodeIdentity {
        &self.ctx.config().topology.genesis
    }

    fn validators(&self) -> &'a [NodeIdentity] {
        &self.ctx.config().topology.validators
    }

    /// Archive the logs of `layer` on `targets` and wait for the archive to
    /// finish.
    pub(crate) async fn archive_logs(&self, targets: &[String], layer: Layer) -> ReviveResult<()> {
        let settings = self.ctx.config().layer(layer)?;
        let now = self.ctx.effects().now().await;
        self.ctx
            .dispatch(targets, commands::archive_logs(layer, settings, now), "archive logs")
            .await;
        self.ctx.settle(self.ctx.policy().log_archive_settle_ms).await;
        Ok(())
    }

    /// Dispatch the start command of `node` on `layer`.
    pub(crate) async fn start_node(
        &self,
        node: &NodeIdentity,
        layer: Layer,
        mode: StartMode,
        reference: &ReferenceNode,
        l0_peer: Option<&L0Peer>,
    ) -> ReviveResult<()> {
        let credentials = self
            .ctx
            .effects()
            .node_credentials(&node.id, layer)
            .await?;
        let spec = StartSpec {
            layer,
            settings: self.ctx.config().layer(layer)?,
            mode,
            node_ip: &node.ip,
            credentials: &credentials,
            reference,
            l0_peer,
            cluster: &self.ctx.config().cluster,
        };

        tracing::info!(node = %node.ip, %layer, mode = mode.as_arg(), "starting node");
        self.ctx
            .dispatch(&[node.id.clone()], commands::start_node(&spec), "start node")
            .await;
        Ok(())
    }

    /// The live L0 peer application layers attach to.
    pub(crate) async fn l0_peer(&self) -> ReviveResult<L0Peer> {
        let peer = HealthProber::new(self.ctx).join_target(Layer::L0).await?;
        Ok(L0Peer {
            id: peer.id,
            host: peer.host,
            http_port: self.ctx.config().public_port(Layer::L0)?,
        })
    }

    /// Start `node` as a validator on `layer`, wait for it and join `peer`.
    pub(crate) async fn start_and_join(
        &self,
        node: &NodeIdentity,
        layer: Layer,
        reference: &ReferenceNode,
        l0_peer: Option<&L0Peer>,
        peer: &JoinPeer,
    ) -> ReviveResult<()> {
        let settings = self.ctx.config().layer(layer)?;
        self.start_node(node, layer, StartMode::Validator, reference, l0_peer)
            .await?;
        HealthProber::new(self.ctx)
            .await_started(&NodeAddress::new(node.ip.clone(), settings.public_port))
            .await?;

        tracing::info!(node = %node.ip, %layer, peer = %peer.host, "joining cluster");
        self.ctx
            .dispatch(
                &[node.id.clone()],
                commands::join_cluster(settings.cli_port, peer),
                "join cluster",
            )
            .await;
        Ok(())
    }

    /// Rollback phase. Fetches the last cluster snapshot before touching
    /// anything, so an unreachable ledger aborts without side effects.
    pub async fn start_rollback(&self, reference: &ReferenceNode) -> ReviveResult<()> {
        let last = SnapshotMonitor::new(self.ctx).last_snapshot().await?;
        let config = self.ctx.config();
        let everyone = config.topology.node_ids();
        let genesis = [self.genesis().id.clone()];

        let ports = config
            .enabled_layers()
            .into_iter()
            .map(|layer| config.public_port(layer))
            .collect::<ReviveResult<Vec<u16>>>()?;
        self.ctx
            .dispatch(&everyone, commands::stop_layers(&ports), "stop all layers")
            .await;

        let now = self.ctx.effects().now().await;
        let l0 = config.layer(Layer::L0)?;
        self.ctx
            .dispatch(
                &genesis,
                commands::backup_snapshots(l0, last.ordinal, last.ordinal + 1, now),
                "back up snapshots",
            )
            .await;

        self.archive_logs(&genesis, Layer::L0).await?;
        self.start_node(self.genesis(), Layer::L0, StartMode::Rollback, reference, None)
            .await?;

        tracing::info!(
            cluster_id = %self.ctx.cluster_id(),
            reference = %reference.ip,
            ordinal = last.ordinal,
            "rollback dispatched"
        );
        Ok(())
    }

    /// Join phase: validators on L0, then every enabled application layer.
    pub async fn join_phase(&self, reference: &ReferenceNode) -> ReviveResult<()> {
        let validator_ids: Vec<String> = self.validators().iter().map(|v| v.id.clone()).collect();
        self.archive_logs(&validator_ids, Layer::L0).await?;

        let peer = HealthProber::new(self.ctx).join_target(Layer::L0).await?;
        for validator in self.validators() {
            self.start_and_join(validator, Layer::L0, reference, None, &peer)
                .await?;
        }

        for layer in self.ctx.config().enabled_layers() {
            if layer.is_application_layer() {
                self.bring_up_layer(layer, reference).await?;
            }
        }

        tracing::info!(cluster_id = %self.ctx.cluster_id(), "join phase dispatched");
        Ok(())
    }

    /// Bring an application layer up from scratch on every node: genesis as
    /// initial validator, then each validator joining.
    pub async fn bring_up_layer(&self, layer: Layer, reference: &ReferenceNode) -> ReviveResult<()> {
        let config = self.ctx.config();
        let everyone = config.topology.node_ids();
        self.ctx
            .dispatch(
                &everyone,
                commands::stop_layer(config.public_port(layer)?),
                "stop layer",
            )
            .await;
        self.archive_logs(&everyone, layer).await?;

        let l0_peer = self.l0_peer().await?;
        self.start_node(
            self.genesis(),
            layer,
            StartMode::InitialValidator,
            reference,
            Some(&l0_peer),
        )
        .await?;
        self.ctx
            .settle(self.ctx.policy().initial_validator_settle_ms)
            .await;

        let peer = HealthProber::new(self.ctx).join_target(layer).await?;
        for validator in self.validators() {
            self.start_and_join(validator, layer, reference, Some(&l0_peer), &peer)
                .await?;
        }
        tracing::info!(%layer, "layer bring-up dispatched");
        Ok(())
    }
}
