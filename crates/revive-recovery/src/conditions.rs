//! Restart condition evaluation.
//!
//! Signals are checked in a fixed priority order and the first match wins:
//! an operator force, stalled snapshot production, unhealthy nodes, then
//! stalled data application transactions. [`decide`] is the pure part;
//! [`ConditionEvaluator`] gathers the signals lazily, stopping at the first
//! one that already determines the outcome.

use crate::context::RestartContext;
use crate::effects::RestartEffects;
use crate::health::{HealthProber, UnhealthyNodes};
use crate::snapshots::SnapshotMonitor;
use revive_core::types::{NodeAddress, NodeHealth, NodeHealthRecord};
use revive_core::{ControllerConfig, Layer, RestartReason, RestartType, ReviveResult};

/// Observations the decision is based on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionSignals {
    /// Operator asked for a full restart
    pub force_restart: bool,
    /// Snapshot production is older than the stall threshold
    pub snapshots_stalled: bool,
    /// Nodes that failed their readiness probe
    pub unhealthy: UnhealthyNodes,
    /// No application blocks in the recent snapshot window
    pub data_layer_stalled: bool,
}

/// Nodes and whole layers an individual restart acts on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndividualPlan {
    /// Application layers with every member down, brought up from scratch
    pub whole_layers: Vec<Layer>,
    /// Scattered unhealthy nodes restarted one by one
    pub nodes: Vec<NodeHealthRecord>,
}

impl IndividualPlan {
    /// Split `unhealthy` into whole-layer outages and scattered nodes.
    pub fn from_unhealthy(unhealthy: &UnhealthyNodes, node_count: usize) -> Self {
        let mut plan = Self::default();
        for (layer, records) in &unhealthy.by_layer {
            if layer.is_application_layer() && records.len() >= node_count {
                plan.whole_layers.push(*layer);
            } else {
                plan.nodes.extend(records.iter().cloned());
            }
        }
        plan
    }

    /// Every `ip:port` this plan restarts, whole layers expanded.
    pub fn targets(&self, config: &ControllerConfig) -> ReviveResult<Vec<NodeAddress>> {
        let mut targets = Vec::new();
        for layer in &self.whole_layers {
            let port = config.public_port(*layer)?;
            targets.extend(
                config
                    .topology
                    .nodes()
                    .map(|node| NodeAddress::new(node.ip.clone(), port)),
            );
        }
        targets.extend(self.nodes.iter().map(NodeHealthRecord::address));
        Ok(targets)
    }

    /// Whether there is nothing to restart.
    pub fn is_empty(&self) -> bool {
        self.whole_layers.is_empty() && self.nodes.is_empty()
    }
}

/// What the controller should do about the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartCondition {
    /// Healthy
    NotRestart,
    /// Roll the whole cluster back
    FullCluster {
        /// Why
        reason: RestartReason,
    },
    /// Restart only what is broken
    IndividualNodes {
        /// Why
        reason: RestartReason,
        /// Unhealthy nodes by layer
        unhealthy: UnhealthyNodes,
    },
}

impl RestartCondition {
    /// Restart type this condition leads to.
    pub fn restart_type(&self) -> RestartType {
        match self {
            RestartCondition::NotRestart => RestartType::None,
            RestartCondition::FullCluster { .. } => RestartType::FullCluster,
            RestartCondition::IndividualNodes { .. } => RestartType::IndividualNodes,
        }
    }
}

fn whole_data_layer(config: &ControllerConfig) -> UnhealthyNodes {
    let Ok(port) = config.public_port(Layer::DataL1) else {
        return UnhealthyNodes::default();
    };
    UnhealthyNodes::from_records(config.topology.nodes().map(|node| NodeHealthRecord {
        layer: Layer::DataL1,
        ip: node.ip.clone(),
        port,
        id: node.id.clone(),
        state: NodeHealth::NotReady,
    }))
}

/// Decide from already gathered signals.
pub fn decide(signals: &ConditionSignals, config: &ControllerConfig) -> RestartCondition {
    if signals.force_restart {
        return RestartCondition::FullCluster {
            reason: RestartReason::Forced,
        };
    }
    if signals.snapshots_stalled {
        return RestartCondition::FullCluster {
            reason: RestartReason::SnapshotsStalled,
        };
    }

    let unhealthy = &signals.unhealthy;
    if !unhealthy.is_empty() {
        let node_count = config.topology.node_count();
        let fleet = node_count * config.enabled_layers().len();
        if unhealthy.layer(Layer::L0).len() >= node_count || unhealthy.total() >= fleet {
            return RestartCondition::FullCluster {
                reason: RestartReason::UnhealthyNodes,
            };
        }
        return RestartCondition::IndividualNodes {
            reason: RestartReason::UnhealthyNodes,
            unhealthy: unhealthy.clone(),
        };
    }

    let monitored = config.cluster.include_data_l1 && config.cluster.monitor_data_l1_transactions;
    if monitored && signals.data_layer_stalled {
        return RestartCondition::IndividualNodes {
            reason: RestartReason::DataTransactionsStalled,
            unhealthy: whole_data_layer(config),
        };
    }

    RestartCondition::NotRestart
}

/// Gathers signals in priority order and decides.
pub struct ConditionEvaluator<'a, E: RestartEffects> {
    ctx: &'a RestartContext<E>,
}

impl<'a, E: RestartEffects> ConditionEvaluator<'a, E> {
    /// Create an evaluator bound to `ctx`.
    pub fn new(ctx: &'a RestartContext<E>) -> Self {
        Self { ctx }
    }

    /// Evaluate the cluster, skipping checks a higher-priority signal
    /// already settles.
    pub async fn evaluate(&self) -> ReviveResult<RestartCondition> {
        let config = self.ctx.config();
        let mut signals = ConditionSignals {
            force_restart: config.cluster.force_restart,
            ..ConditionSignals::default()
        };

        if !signals.force_restart {
            let monitor = SnapshotMonitor::new(self.ctx);
            signals.snapshots_stalled = monitor.snapshots_stalled().await?;

            if !signals.snapshots_stalled {
                signals.unhealthy = HealthProber::new(self.ctx).unhealthy_nodes().await?;

                if signals.unhealthy.is_empty()
                    && config.cluster.include_data_l1
                    && config.cluster.monitor_data_l1_transactions
                {
                    signals.data_layer_stalled = monitor.data_layer_stalled().await?;
                }
            }
        }

        let condition = decide(&signals, config);
        tracing::info!(
            cluster_id = %self.ctx.cluster_id(),
            restart_type = %condition.restart_type(),
            "restart conditions evaluated"
        );
        Ok(condition)
    }
}
