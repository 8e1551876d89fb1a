//! Top-level controller: one invocation of the restart loop.
//!
//! ```text
//! load record ──► reconcile ──► Completed ──► validate ──► delete + close alert
//!                     │
//!                     └──► NoEpisode ──► evaluate ──► claim ──► dispatch ──► ROLLBACK IN PROGRESS
//! ```
//!
//! A forced restart skips evaluation only when no episode is open; an open
//! episode is reconciled like any other.
//!
//! Fatal errors always raise a failure alert before being returned.

use crate::alerts::Notifier;
use crate::conditions::{ConditionEvaluator, IndividualPlan, RestartCondition};
use crate::context::RestartContext;
use crate::effects::RestartEffects;
use crate::full_cluster::FullClusterOrchestrator;
use crate::health::HealthProber;
use crate::individual::IndividualOrchestrator;
use crate::reconcile::{ReconcileOutcome, Reconciler};
use crate::records::RecordStore;
use crate::snapshots::SnapshotMonitor;
use futures::future::join_all;
use revive_core::types::RestartEpisode;
use revive_core::{
    ControllerConfig, RestartReason, RestartRecord, RestartState, RestartType, ReviveError,
    ReviveResult,
};
use serde::Serialize;
use std::sync::Arc;

/// How an invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerOutcome {
    /// Nothing wrong, nothing done
    Healthy,
    /// An episode is running and was left alone
    InProgress,
    /// Another invocation claimed the episode first
    AlreadyClaimed,
    /// The join phase of a full cluster restart was dispatched
    JoinTriggered,
    /// A new episode was started
    RestartStarted(RestartType),
    /// The open episode was given up
    Abandoned,
    /// The episode finished and the cluster validated
    HealthyAfterRestart,
}

/// Response of one invocation, `{"statusCode": .., "body": ..}` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerResponse {
    /// HTTP-style status
    pub status_code: u16,
    /// Human readable outcome
    pub body: String,
    /// Machine readable outcome
    #[serde(skip)]
    pub outcome: ControllerOutcome,
}

impl ControllerResponse {
    fn ok(outcome: ControllerOutcome, body: impl Into<String>) -> Self {
        Self {
            status_code: 200,
            body: body.into(),
            outcome,
        }
    }
}

/// Fatal error plus the record it concerns, for the failure alert.
struct Failure {
    error: ReviveError,
    record: Option<RestartRecord>,
}

impl From<ReviveError> for Failure {
    fn from(error: ReviveError) -> Self {
        Self {
            error,
            record: None,
        }
    }
}

/// Runs one invocation against a cluster.
pub struct RestartController<E: RestartEffects> {
    ctx: RestartContext<E>,
}

impl<E: RestartEffects> RestartController<E> {
    /// Validate `config` and bind it to `effects`.
    pub fn new(effects: Arc<E>, config: ControllerConfig) -> ReviveResult<Self> {
        Ok(Self {
            ctx: RestartContext::new(effects, config)?,
        })
    }

    /// The invocation context.
    pub fn context(&self) -> &RestartContext<E> {
        &self.ctx
    }

    /// Run one invocation.
    pub async fn run(&self) -> ReviveResult<ControllerResponse> {
        tracing::info!(
            cluster_id = %self.ctx.cluster_id(),
            network = %self.ctx.network(),
            "restart controller invoked"
        );
        match self.run_inner().await {
            Ok(response) => {
                tracing::info!(outcome = ?response.outcome, body = %response.body, "invocation finished");
                Ok(response)
            }
            Err(Failure { error, record }) => {
                tracing::error!(error = %error, "invocation failed");
                Notifier::new(&self.ctx)
                    .restart_failed(record.as_ref(), &error.to_string())
                    .await;
                Err(error)
            }
        }
    }

    async fn run_inner(&self) -> Result<ControllerResponse, Failure> {
        let store = RecordStore::new(&self.ctx);
        let record = store.load().await?;

        match Reconciler::new(&self.ctx).reconcile(record).await? {
            ReconcileOutcome::NoEpisode => {}
            ReconcileOutcome::InProgress(record) => {
                return Ok(ControllerResponse::ok(
                    ControllerOutcome::InProgress,
                    format!(
                        "{} restart already in progress ({}), last update {}",
                        record.restart_type(),
                        record.state,
                        record.updated_at.to_rfc3339()
                    ),
                ));
            }
            ReconcileOutcome::JoinTriggered(_) => {
                return Ok(ControllerResponse::ok(
                    ControllerOutcome::JoinTriggered,
                    "Genesis node ready, join phase triggered",
                ));
            }
            ReconcileOutcome::Superseded => {
                return Ok(ControllerResponse::ok(
                    ControllerOutcome::AlreadyClaimed,
                    "Another invocation changed the restart record first",
                ));
            }
            ReconcileOutcome::Abandoned { reason, .. } => {
                return Ok(ControllerResponse::ok(
                    ControllerOutcome::Abandoned,
                    format!("Restart abandoned: {reason}. A new restart may start on the next run"),
                ));
            }
            ReconcileOutcome::Completed(record) => return self.finish(record).await,
        }

        match ConditionEvaluator::new(&self.ctx).evaluate().await? {
            RestartCondition::NotRestart => Ok(ControllerResponse::ok(
                ControllerOutcome::Healthy,
                "Cluster healthy, no restart needed",
            )),
            RestartCondition::FullCluster { reason } => self.start_full_cluster(reason).await,
            RestartCondition::IndividualNodes { reason, unhealthy } => {
                let plan =
                    IndividualPlan::from_unhealthy(&unhealthy, self.ctx.config().topology.node_count());
                self.start_individual(reason, &plan).await
            }
        }
    }

    async fn start_full_cluster(&self, reason: RestartReason) -> Result<ControllerResponse, Failure> {
        let reference = SnapshotMonitor::new(&self.ctx).select_reference_node().await?;
        let store = RecordStore::new(&self.ctx);
        let Some(claimed) = store
            .claim(RestartEpisode::full_cluster(reason, reference.ip.clone()))
            .await?
        else {
            return Ok(already_claimed());
        };

        if let Err(error) = FullClusterOrchestrator::new(&self.ctx)
            .start_rollback(&reference)
            .await
        {
            return Err(self.release_failed(&store, claimed, error).await);
        }
        let record = store
            .transition(&claimed, RestartState::RollbackInProgress)
            .await?;
        Notifier::new(&self.ctx).restart_started(&record).await;

        Ok(ControllerResponse::ok(
            ControllerOutcome::RestartStarted(RestartType::FullCluster),
            format!("{} restart started: {reason}", RestartType::FullCluster),
        ))
    }

    async fn start_individual(
        &self,
        reason: RestartReason,
        plan: &IndividualPlan,
    ) -> Result<ControllerResponse, Failure> {
        let targets = plan.targets(self.ctx.config())?;
        let reference = SnapshotMonitor::new(&self.ctx).select_reference_node().await?;
        let store = RecordStore::new(&self.ctx);
        let Some(claimed) = store
            .claim(RestartEpisode::individual_nodes(reason, targets.clone()))
            .await?
        else {
            return Ok(already_claimed());
        };

        if let Err(error) = IndividualOrchestrator::new(&self.ctx)
            .execute(plan, &reference)
            .await
        {
            return Err(self.release_failed(&store, claimed, error).await);
        }
        let record = store
            .transition(&claimed, RestartState::RollbackInProgress)
            .await?;
        Notifier::new(&self.ctx).restart_started(&record).await;

        let targets: Vec<String> = targets.iter().map(ToString::to_string).collect();
        Ok(ControllerResponse::ok(
            ControllerOutcome::RestartStarted(RestartType::IndividualNodes),
            format!(
                "{} restart started: {reason} ({})",
                RestartType::IndividualNodes,
                targets.join(", ")
            ),
        ))
    }

    /// Hand a claim whose first actions failed back as a fresh NEW record,
    /// so the next invocation may claim again.
    async fn release_failed(
        &self,
        store: &RecordStore<'_, E>,
        claimed: RestartRecord,
        error: ReviveError,
    ) -> Failure {
        if let Err(release_error) = store.release(&claimed).await {
            tracing::warn!(error = %release_error, "could not release the failed claim");
        }
        Failure {
            error,
            record: Some(claimed),
        }
    }

    /// Validate a completed episode and close it either way.
    async fn finish(&self, record: RestartRecord) -> Result<ControllerResponse, Failure> {
        let store = RecordStore::new(&self.ctx);
        let validation = self.validate_restart().await;
        store.delete().await?;

        match validation {
            Ok(()) => {
                Notifier::new(&self.ctx).restart_finished().await;
                Ok(ControllerResponse::ok(
                    ControllerOutcome::HealthyAfterRestart,
                    format!("Cluster healthy after {} restart", record.restart_type()),
                ))
            }
            Err(error) => Err(Failure {
                error,
                record: Some(record),
            }),
        }
    }

    /// All nodes Ready on every layer, clusters formed, fresh snapshots.
    async fn validate_restart(&self) -> ReviveResult<()> {
        let prober = HealthProber::new(&self.ctx);
        let layers = self.ctx.config().enabled_layers();

        for result in join_all(layers.iter().map(|layer| prober.await_all_ready(*layer))).await {
            result?;
        }

        for layer in &layers {
            if !prober.cluster_is_healthy(*layer).await? {
                return Err(ReviveError::invalid(format!(
                    "{layer} cluster did not form after restart"
                )));
            }
        }

        self.ctx
            .settle(self.ctx.policy().post_restart_settle_ms)
            .await;
        if SnapshotMonitor::new(&self.ctx).snapshots_stalled().await? {
            return Err(ReviveError::timeout(
                "snapshots still not produced after restart",
            ));
        }
        Ok(())
    }
}

fn already_claimed() -> ControllerResponse {
    ControllerResponse::ok(
        ControllerOutcome::AlreadyClaimed,
        "Another invocation already started a restart",
    )
}
