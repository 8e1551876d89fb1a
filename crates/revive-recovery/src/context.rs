//! Per-invocation context shared by every engine component.

use crate::effects::RestartEffects;
use revive_core::config::NetworkName;
use revive_core::effects::CommandReceipt;
use revive_core::{ControllerConfig, PolicyConfig, ReviveResult};
use std::sync::Arc;

/// Validated configuration plus the effect system of one invocation.
///
/// Built once per invocation and passed by reference; nothing in it is
/// reused across invocations.
pub struct RestartContext<E: RestartEffects> {
    effects: Arc<E>,
    config: Arc<ControllerConfig>,
    network: NetworkName,
}

impl<E: RestartEffects> Clone for RestartContext<E> {
    fn clone(&self) -> Self {
        Self {
            effects: Arc::clone(&self.effects),
            config: Arc::clone(&self.config),
            network: self.network,
        }
    }
}

impl<E: RestartEffects> RestartContext<E> {
    /// Validate `config` and bind it to `effects`.
    pub fn new(effects: Arc<E>, config: ControllerConfig) -> ReviveResult<Self> {
        config.validate()?;
        let network = config.network_name()?;
        Ok(Self {
            effects,
            config: Arc::new(config),
            network,
        })
    }

    /// The effect system.
    pub fn effects(&self) -> &E {
        &self.effects
    }

    /// The validated configuration.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Thresholds and retry budgets.
    pub fn policy(&self) -> &PolicyConfig {
        &self.config.policy
    }

    /// Network the cluster runs on.
    pub fn network(&self) -> NetworkName {
        self.network
    }

    /// Id of the managed cluster.
    pub fn cluster_id(&self) -> &str {
        &self.config.cluster.id
    }

    /// Submit a command batch without waiting for it to run.
    ///
    /// Submission failures are logged and swallowed; later health probes
    /// decide whether the action took effect.
    pub async fn dispatch(
        &self,
        targets: &[String],
        commands: Vec<String>,
        action: &str,
    ) -> Option<CommandReceipt> {
        match self.effects.dispatch(targets, &commands).await {
            Ok(receipt) => {
                tracing::info!(
                    action,
                    command_id = %receipt.id,
                    targets = ?targets,
                    "command dispatched"
                );
                Some(receipt)
            }
            Err(err) => {
                tracing::warn!(action, targets = ?targets, error = %err, "command dispatch failed");
                None
            }
        }
    }

    /// Pause for `ms` milliseconds.
    pub async fn settle(&self, ms: u64) {
        if ms > 0 {
            self.effects.sleep_ms(ms).await;
        }
    }
}
