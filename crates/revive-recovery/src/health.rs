//! Node readiness probing.
//!
//! Two failure shapes are kept apart throughout: a node that answers but is
//! not `Ready` yet, and a node that does not answer at all. Probes across
//! nodes and layers run concurrently; each individual probe is a bounded
//! fixed-delay poll.

use crate::context::RestartContext;
use crate::effects::RestartEffects;
use futures::future::join_all;
use revive_core::types::{JoinPeer, NodeAddress, NodeHealth, NodeHealthRecord, NodeIdentity};
use revive_core::{Layer, ReviveError, ReviveResult};
use std::collections::BTreeMap;

/// Result of probing one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// The node reported `Ready`
    pub ready: bool,
    /// The node answered at all
    pub probe_succeeded: bool,
}

impl ProbeOutcome {
    const UNREACHABLE: Self = Self {
        ready: false,
        probe_succeeded: false,
    };

    /// Collapse into a health classification.
    pub fn health(self) -> NodeHealth {
        match (self.ready, self.probe_succeeded) {
            (true, _) => NodeHealth::Ready,
            (false, true) => NodeHealth::NotReady,
            (false, false) => NodeHealth::Unreachable,
        }
    }
}

/// Unhealthy nodes grouped by layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnhealthyNodes {
    /// Layer to its unhealthy members, in topology order
    pub by_layer: BTreeMap<Layer, Vec<NodeHealthRecord>>,
}

impl UnhealthyNodes {
    /// Group probe results, keeping only the unhealthy ones.
    pub fn from_records(records: impl IntoIterator<Item = NodeHealthRecord>) -> Self {
        let mut by_layer: BTreeMap<Layer, Vec<NodeHealthRecord>> = BTreeMap::new();
        for record in records.into_iter().filter(|r| !r.state.is_ready()) {
            by_layer.entry(record.layer).or_default().push(record);
        }
        Self { by_layer }
    }

    /// Unhealthy members of `layer`.
    pub fn layer(&self, layer: Layer) -> &[NodeHealthRecord] {
        self.by_layer.get(&layer).map_or(&[], Vec::as_slice)
    }

    /// Unhealthy nodes across all layers.
    pub fn total(&self) -> usize {
        self.by_layer.values().map(Vec::len).sum()
    }

    /// Whether every probed node was healthy.
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Every unhealthy node, layer by layer.
    pub fn iter(&self) -> impl Iterator<Item = &NodeHealthRecord> {
        self.by_layer.values().flatten()
    }
}

/// Probes node and cluster endpoints of the managed cluster.
pub struct HealthProber<'a, E: RestartEffects> {
    ctx: &'a RestartContext<E>,
}

impl<'a, E: RestartEffects> HealthProber<'a, E> {
    /// Create a prober bound to `ctx`.
    pub fn new(ctx: &'a RestartContext<E>) -> Self {
        Self { ctx }
    }

    async fn probe_once(&self, address: &NodeAddress) -> ProbeOutcome {
        match self.ctx.effects().node_info(address).await {
            Ok(info) => ProbeOutcome {
                ready: info.is_ready(),
                probe_succeeded: true,
            },
            Err(err) => {
                tracing::debug!(node = %address, error = %err, "node probe failed");
                ProbeOutcome::UNREACHABLE
            }
        }
    }

    /// Poll `address` until it reports `Ready` or the probe budget is spent.
    ///
    /// The last observation decides the outcome, so a node that answered on
    /// earlier attempts but went silent at the end counts as unreachable.
    pub async fn is_node_ready(&self, address: &NodeAddress) -> ProbeOutcome {
        let policy = self.ctx.policy().health_probe;
        let attempts = policy.max_attempts.max(1);
        let mut outcome = ProbeOutcome::UNREACHABLE;

        for attempt in 1..=attempts {
            outcome = self.probe_once(address).await;
            if outcome.ready {
                break;
            }
            if attempt < attempts {
                self.ctx.effects().sleep_ms(policy.delay_ms).await;
            }
        }
        outcome
    }

    fn layer_members(&self, layer: Layer) -> ReviveResult<Vec<(&'a NodeIdentity, NodeAddress)>> {
        let port = self.ctx.config().public_port(layer)?;
        Ok(self
            .ctx
            .config()
            .topology
            .nodes()
            .map(|node| (node, NodeAddress::new(node.ip.clone(), port)))
            .collect())
    }

    /// Classify every node of `layer`, concurrently.
    pub async fn probe_layer(&self, layer: Layer) -> ReviveResult<Vec<NodeHealthRecord>> {
        let members = self.layer_members(layer)?;
        let outcomes = join_all(members.iter().map(|(_, address)| self.is_node_ready(address))).await;

        Ok(members
            .into_iter()
            .zip(outcomes)
            .map(|((node, address), outcome)| NodeHealthRecord {
                layer,
                ip: address.ip,
                port: address.port,
                id: node.id.clone(),
                state: outcome.health(),
            })
            .collect())
    }

    /// Probe every node of every enabled layer and keep the unhealthy ones.
    pub async fn unhealthy_nodes(&self) -> ReviveResult<UnhealthyNodes> {
        let layers = self.ctx.config().enabled_layers();
        let results = join_all(layers.iter().map(|layer| self.probe_layer(*layer))).await;

        let mut records = Vec::new();
        for result in results {
            records.extend(result?);
        }
        let unhealthy = UnhealthyNodes::from_records(records);

        for record in unhealthy.iter() {
            tracing::warn!(
                layer = %record.layer,
                node = %record.address(),
                state = ?record.state,
                "node unhealthy"
            );
        }
        Ok(unhealthy)
    }

    /// Wait until every node of `layer` reports `Ready`.
    ///
    /// Nodes found Ready are not probed again in later rounds. Exhausting the
    /// `all_ready` budget is fatal.
    pub async fn await_all_ready(&self, layer: Layer) -> ReviveResult<()> {
        let policy = self.ctx.policy().all_ready;
        let attempts = policy.max_attempts.max(1);
        let mut pending: Vec<NodeAddress> = self
            .layer_members(layer)?
            .into_iter()
            .map(|(_, address)| address)
            .collect();

        for attempt in 1..=attempts {
            let outcomes = join_all(pending.iter().map(|address| self.probe_once(address))).await;
            pending = pending
                .into_iter()
                .zip(outcomes)
                .filter(|(_, outcome)| !outcome.ready)
                .map(|(address, _)| address)
                .collect();

            if pending.is_empty() {
                tracing::info!(%layer, attempt, "all nodes ready");
                return Ok(());
            }
            tracing::debug!(%layer, attempt, pending = pending.len(), "waiting for nodes to become ready");
            if attempt < attempts {
                self.ctx.effects().sleep_ms(policy.delay_ms).await;
            }
        }

        let pending: Vec<String> = pending.iter().map(ToString::to_string).collect();
        Err(ReviveError::timeout(format!(
            "{layer} nodes not ready after {attempts} attempts: {}",
            pending.join(", ")
        )))
    }

    /// Wait until `address` answers at all, then let it settle.
    pub async fn await_started(&self, address: &NodeAddress) -> ReviveResult<()> {
        let policy = self.ctx.policy().node_started;
        let effects = self.ctx.effects();

        policy
            .run(effects, "node start", |_| effects.node_info(address))
            .await
            .map_err(|err| {
                ReviveError::timeout(format!(
                    "{address} did not start after {} attempts: {err}",
                    policy.max_attempts
                ))
            })?;

        tracing::info!(node = %address, "node started");
        self.ctx.settle(self.ctx.policy().node_started_settle_ms).await;
        Ok(())
    }

    /// The peer a node of `layer` should join: the first `Ready` member,
    /// genesis first. Discovered live on every call.
    pub async fn join_target(&self, layer: Layer) -> ReviveResult<JoinPeer> {
        self.find_join_target(layer, None).await
    }

    /// Like [`Self::join_target`], never picking the node at `ip`.
    pub async fn join_target_excluding(&self, layer: Layer, ip: &str) -> ReviveResult<JoinPeer> {
        self.find_join_target(layer, Some(ip)).await
    }

    async fn find_join_target(&self, layer: Layer, exclude: Option<&str>) -> ReviveResult<JoinPeer> {
        let policy = self.ctx.policy().join_target;
        let effects = self.ctx.effects();
        let members: Vec<NodeAddress> = self
            .layer_members(layer)?
            .into_iter()
            .map(|(_, address)| address)
            .filter(|address| exclude != Some(address.ip.as_str()))
            .collect();
        let members = &members;

        policy
            .run(effects, "join target", |_| async move {
                for address in members {
                    if let Ok(info) = effects.node_info(address).await {
                        if info.is_ready() {
                            let mut peer = JoinPeer::from(info);
                            if peer.host.is_empty() {
                                peer.host = address.ip.clone();
                            }
                            return Ok(peer);
                        }
                    }
                }
                Err(ReviveError::not_found(format!("no ready {layer} node")))
            })
            .await
            .map_err(|err| {
                ReviveError::timeout(format!(
                    "no {layer} join target after {} attempts: {err}",
                    policy.max_attempts
                ))
            })
    }

    /// Whether `/cluster/info` on the genesis node shows a formed cluster.
    ///
    /// L0 needs at least one Ready member; application layers need as many
    /// Ready members as the topology has nodes.
    pub async fn cluster_is_healthy(&self, layer: Layer) -> ReviveResult<bool> {
        let policy = self.ctx.policy().cluster_info;
        let effects = self.ctx.effects();
        let genesis = NodeAddress::new(
            self.ctx.config().topology.genesis.ip.clone(),
            self.ctx.config().public_port(layer)?,
        );
        let required = match layer {
            Layer::L0 => 1,
            _ => self.ctx.config().topology.node_count(),
        };
        let genesis = &genesis;

        let result = policy
            .run(effects, "cluster info", |_| async move {
                let members = effects.cluster_info(genesis).await?;
                let ready = members.iter().filter(|m| m.is_ready()).count();
                if ready >= required {
                    Ok(ready)
                } else {
                    Err(ReviveError::invalid(format!(
                        "{ready} of {required} required {layer} members ready"
                    )))
                }
            })
            .await;

        match result {
            Ok(ready) => {
                tracing::info!(%layer, ready, "cluster formed");
                Ok(true)
            }
            Err(err) => {
                tracing::warn!(%layer, error = %err, "cluster not formed");
                Ok(false)
            }
        }
    }
}
