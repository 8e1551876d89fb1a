//! Restart alert payloads and delivery.
//!
//! Started alerts are informational and are closed once the episode
//! validates; failure alerts page. Delivery problems are logged and never
//! interrupt the restart flow.

use crate::context::RestartContext;
use crate::effects::RestartEffects;
use revive_core::effects::{AlertPayload, AlertPriority};
use revive_core::types::NodeAddress;
use revive_core::{ControllerConfig, RestartRecord};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Alias of the started alert of `cluster_id`.
pub fn started_alias(cluster_id: &str) -> String {
    format!("{cluster_id}_restart")
}

/// Alias of the failure alert of `cluster_id`.
pub fn failure_alias(cluster_id: &str) -> String {
    format!("{cluster_id}_failure_restarted")
}

fn describe(config: &ControllerConfig, record: Option<&RestartRecord>, note: Option<&str>) -> String {
    let mut text = String::new();
    if let Some(note) = note {
        let _ = writeln!(text, "{note}\n");
    }
    let _ = writeln!(text, "Network: {}", config.network.name);
    let _ = writeln!(text, "Cluster: {} ({})", config.cluster.name, config.cluster.id);

    match record {
        Some(record) => {
            let _ = writeln!(text, "Restart type: {}", record.restart_type());
            if let Some(reason) = record.reason() {
                let _ = writeln!(text, "Restart reason: {reason}");
            }
            let _ = writeln!(text, "Restart state: {}", record.state);
            if let Some(ip) = record.reference_node_ip() {
                let _ = writeln!(text, "Reference source node: {ip}");
            }
            if let Some(targets) = record.individual_targets() {
                let targets: Vec<String> = targets.iter().map(ToString::to_string).collect();
                let _ = writeln!(text, "Targets: {}", targets.join(", "));
            }
        }
        None => {
            let _ = writeln!(text, "Restart type: none");
        }
    }

    let _ = writeln!(text, "\nNode info:");
    for layer in config.enabled_layers() {
        let Ok(port) = config.public_port(layer) else {
            continue;
        };
        for node in config.topology.nodes() {
            let url = NodeAddress::new(node.ip.clone(), port).node_info_url();
            let _ = writeln!(text, "  {}: {url}", layer.short_label());
        }
    }

    let _ = writeln!(text, "\nInstances:");
    let _ = writeln!(
        text,
        "  genesis: {} ({})",
        config.topology.genesis.id, config.topology.genesis.ip
    );
    for (index, node) in config.topology.validators.iter().enumerate() {
        let _ = writeln!(text, "  validator {}: {} ({})", index + 1, node.id, node.ip);
    }
    text
}

fn payload(
    config: &ControllerConfig,
    message: String,
    description: String,
    alias: String,
    priority: AlertPriority,
) -> AlertPayload {
    let mut details = BTreeMap::new();
    details.insert("metagraphId".to_string(), config.cluster.id.clone());
    details.insert("network".to_string(), config.network.name.clone());
    details.insert("metagraphName".to_string(), config.cluster.name.clone());

    let tags = config
        .network_name()
        .map(|network| vec![network.alert_tag().to_string()])
        .unwrap_or_default();

    AlertPayload {
        message,
        description,
        alias,
        actions: vec!["Metagraph".to_string(), "Restart".to_string()],
        tags,
        details,
        entity: "Metagraph".to_string(),
        priority,
    }
}

/// Payload announcing that `record`'s episode started.
pub fn started_alert(config: &ControllerConfig, record: &RestartRecord) -> AlertPayload {
    payload(
        config,
        format!("{} Metagraph Started a Restart", config.cluster.name),
        describe(config, Some(record), None),
        started_alias(&config.cluster.id),
        AlertPriority::P3,
    )
}

/// Payload reporting a failed or abandoned episode.
pub fn failure_alert(
    config: &ControllerConfig,
    record: Option<&RestartRecord>,
    error: &str,
) -> AlertPayload {
    payload(
        config,
        format!("{} Metagraph Failed to Restart", config.cluster.name),
        describe(config, record, Some(error)),
        failure_alias(&config.cluster.id),
        AlertPriority::P1,
    )
}

/// Sends restart alerts unless alerting is disabled.
pub struct Notifier<'a, E: RestartEffects> {
    ctx: &'a RestartContext<E>,
}

impl<'a, E: RestartEffects> Notifier<'a, E> {
    /// Create a notifier bound to `ctx`.
    pub fn new(ctx: &'a RestartContext<E>) -> Self {
        Self { ctx }
    }

    fn enabled(&self) -> bool {
        if !self.ctx.config().alerts.enabled {
            tracing::debug!("alerts disabled, skipping");
            return false;
        }
        true
    }

    async fn send(&self, payload: AlertPayload) {
        if let Err(err) = self.ctx.effects().create_alert(&payload).await {
            tracing::warn!(alias = %payload.alias, error = %err, "alert delivery failed");
        }
    }

    /// Announce a started episode.
    pub async fn restart_started(&self, record: &RestartRecord) {
        if self.enabled() {
            self.send(started_alert(self.ctx.config(), record)).await;
        }
    }

    /// Report a failed episode or invocation.
    pub async fn restart_failed(&self, record: Option<&RestartRecord>, error: &str) {
        if self.enabled() {
            self.send(failure_alert(self.ctx.config(), record, error)).await;
        }
    }

    /// Close the started alert of the current cluster.
    pub async fn restart_finished(&self) {
        if !self.enabled() {
            return;
        }
        let alias = started_alias(self.ctx.cluster_id());
        if let Err(err) = self.ctx.effects().close_alert(&alias).await {
            tracing::warn!(%alias, error = %err, "closing alert failed");
        }
    }
}
