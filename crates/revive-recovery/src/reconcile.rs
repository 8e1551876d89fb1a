//! Progress reconciliation of an open restart episode.

use crate::alerts::Notifier;
use crate::context::RestartContext;
use crate::effects::RestartEffects;
use crate::full_cluster::FullClusterOrchestrator;
use crate::health::HealthProber;
use crate::records::RecordStore;
use crate::snapshots::SnapshotMonitor;
use futures::future::join_all;
use revive_core::types::NodeHealth;
use revive_core::{
    Layer, ReferenceNode, RestartRecord, RestartState, RestartType, ReviveError, ReviveResult,
};

/// What reconciling the stored record amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No episode open; conditions should be evaluated
    NoEpisode,
    /// Episode still running, nothing changed beyond probe-driven transitions
    InProgress(RestartRecord),
    /// Genesis became Ready and the join phase was dispatched
    JoinTriggered(RestartRecord),
    /// Every target is Ready; the episode awaits post-restart validation
    Completed(RestartRecord),
    /// Another invocation changed the record while this one was deciding
    Superseded,
    /// Episode given up; the record was replaced by a fresh NEW one
    Abandoned {
        /// The record as it was when abandoned
        record: RestartRecord,
        /// Why
        reason: String,
    },
}

/// Moves an open episode forward based on what the nodes report.
pub struct Reconciler<'a, E: RestartEffects> {
    ctx: &'a RestartContext<E>,
    store: RecordStore<'a, E>,
}

impl<'a, E: RestartEffects> Reconciler<'a, E> {
    /// Create a reconciler bound to `ctx`.
    pub fn new(ctx: &'a RestartContext<E>) -> Self {
        Self {
            ctx,
            store: RecordStore::new(ctx),
        }
    }

    /// Reconcile `record`.
    ///
    /// The episode timeout is checked first, whatever the state: a record
    /// older than the timeout is abandoned without probing. A record claimed
    /// but still NEW belongs to an invocation that is dispatching its first
    /// actions and is left alone until then.
    pub async fn reconcile(&self, record: Option<RestartRecord>) -> ReviveResult<ReconcileOutcome> {
        let Some(record) = record else {
            return Ok(ReconcileOutcome::NoEpisode);
        };
        if !record.is_in_flight() {
            return Ok(ReconcileOutcome::NoEpisode);
        }

        let now = self.ctx.effects().now().await;
        let elapsed = record.minutes_since_update(now);
        let timeout = self.ctx.policy().episode_timeout_minutes;
        if elapsed > timeout {
            let reason = format!(
                "restart stuck in {} for {elapsed} minutes, over the {timeout} minute limit",
                record.state
            );
            return self.abandon(record, reason).await;
        }

        match record.state {
            RestartState::Ready => return Ok(ReconcileOutcome::Completed(record)),
            RestartState::New => {
                tracing::info!(
                    restart_type = %record.restart_type(),
                    "episode claimed, first actions still being dispatched"
                );
                return Ok(ReconcileOutcome::InProgress(record));
            }
            _ => {}
        }

        match record.restart_type() {
            RestartType::FullCluster => self.reconcile_full(record).await,
            RestartType::IndividualNodes => self.reconcile_individual(record).await,
            RestartType::None => Err(ReviveError::corrupt_record(format!(
                "record in {} without an episode",
                record.state
            ))),
        }
    }

    async fn abandon(&self, record: RestartRecord, reason: String) -> ReviveResult<ReconcileOutcome> {
        tracing::error!(
            cluster_id = %record.cluster_id,
            state = %record.state,
            restart_type = %record.restart_type(),
            %reason,
            "abandoning restart episode"
        );
        if !self.store.release(&record).await? {
            return Ok(ReconcileOutcome::Superseded);
        }
        Notifier::new(self.ctx)
            .restart_failed(Some(&record), &reason)
            .await;
        Ok(ReconcileOutcome::Abandoned { record, reason })
    }

    async fn reconcile_full(&self, record: RestartRecord) -> ReviveResult<ReconcileOutcome> {
        if record.state == RestartState::ReadyToJoin {
            return self.run_join_phase(record).await;
        }

        let probes = HealthProber::new(self.ctx).probe_layer(Layer::L0).await?;
        let genesis_ip = &self.ctx.config().topology.genesis.ip;
        let all_ready = probes.iter().all(|p| p.state.is_ready());
        let genesis_ready = probes
            .iter()
            .any(|p| &p.ip == genesis_ip && p.state.is_ready());

        if all_ready {
            let record = self.store.transition(&record, RestartState::Ready).await?;
            return Ok(ReconcileOutcome::Completed(record));
        }

        if genesis_ready && record.state == RestartState::RollbackInProgress {
            let record = self
                .store
                .transition(&record, RestartState::ReadyToJoin)
                .await?;
            return self.run_join_phase(record).await;
        }

        tracing::info!(state = %record.state, "full cluster restart still in progress");
        Ok(ReconcileOutcome::InProgress(record))
    }

    async fn run_join_phase(&self, record: RestartRecord) -> ReviveResult<ReconcileOutcome> {
        let reference = self.reference_for(&record).await?;
        FullClusterOrchestrator::new(self.ctx)
            .join_phase(&reference)
            .await?;
        let record = self.store.transition(&record, RestartState::Joining).await?;
        Ok(ReconcileOutcome::JoinTriggered(record))
    }

    /// The episode's reference node when it is still a known one, otherwise
    /// a fresh selection.
    async fn reference_for(&self, record: &RestartRecord) -> ReviveResult<ReferenceNode> {
        if let Some(ip) = record.reference_node_ip() {
            if let Some(node) = self
                .ctx
                .config()
                .reference_nodes()?
                .into_iter()
                .find(|node| node.ip == ip)
            {
                return Ok(node);
            }
            tracing::warn!(%ip, "stored reference node unknown, selecting a new one");
        }
        SnapshotMonitor::new(self.ctx).select_reference_node().await
    }

    async fn reconcile_individual(&self, record: RestartRecord) -> ReviveResult<ReconcileOutcome> {
        let targets = record.individual_targets().unwrap_or_default().to_vec();
        let prober = HealthProber::new(self.ctx);
        let outcomes = join_all(targets.iter().map(|target| prober.is_node_ready(target))).await;

        let unreachable: Vec<String> = targets
            .iter()
            .zip(&outcomes)
            .filter(|(_, outcome)| outcome.health() == NodeHealth::Unreachable)
            .map(|(target, _)| target.to_string())
            .collect();
        if !unreachable.is_empty() {
            let reason = format!(
                "restarted nodes unreachable: {}",
                unreachable.join(", ")
            );
            return self.abandon(record, reason).await;
        }

        if outcomes.iter().all(|outcome| outcome.ready) {
            let record = self.store.transition(&record, RestartState::Ready).await?;
            return Ok(ReconcileOutcome::Completed(record));
        }

        tracing::info!(state = %record.state, "individual restart still in progress");
        Ok(ReconcileOutcome::InProgress(record))
    }
}
