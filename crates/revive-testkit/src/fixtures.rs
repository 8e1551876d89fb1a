//! Topology and configuration fixtures.
//!
//! The standard fixture is a three-node cluster (genesis plus two
//! validators) running all three layers, with public ports 7000 (L0), 8000
//! (currency L1) and 9000 (data L1).

use crate::mock::MockEffects;
use revive_core::config::{AlertConfig, ClusterConfig, NetworkConfig};
use revive_core::types::{ClusterMember, ClusterTopology, Layer, NodeIdentity};
use revive_core::{ControllerConfig, LayerConfig, PolicyConfig, RetryPolicy};
use std::collections::BTreeMap;

/// Cluster id used by every fixture.
pub const CLUSTER_ID: &str = "DAG0fixture";

/// Genesis node IP.
pub const GENESIS_IP: &str = "10.0.0.1";

/// Validator IPs, in bring-up order.
pub const VALIDATOR_IPS: [&str; 2] = ["10.0.0.2", "10.0.0.3"];

/// Latest global snapshot hash served by [`healthy_cluster`].
pub const GLOBAL_HASH: &str = "global-hash";

/// Genesis plus two validators.
pub fn sample_topology() -> ClusterTopology {
    ClusterTopology::new(
        NodeIdentity::new("i-genesis", GENESIS_IP),
        vec![
            NodeIdentity::new("i-v1", VALIDATOR_IPS[0]),
            NodeIdentity::new("i-v2", VALIDATOR_IPS[1]),
        ],
    )
}

/// Public port of `layer` in the fixtures.
pub fn public_port(layer: Layer) -> u16 {
    match layer {
        Layer::L0 => 7000,
        Layer::CurrencyL1 => 8000,
        Layer::DataL1 => 9000,
    }
}

fn layer_config(layer: Layer) -> LayerConfig {
    let port = public_port(layer);
    LayerConfig {
        public_port: port,
        p2p_port: port + 1,
        cli_port: port + 2,
        directory: format!("/home/ubuntu/code/{}", layer.key_segment()),
        jar: format!("{}.jar", layer.key_segment()),
        env: Vec::new(),
        seedlist_url: None,
    }
}

/// Policy with the default thresholds and short retry budgets.
pub fn fast_policy() -> PolicyConfig {
    PolicyConfig {
        health_probe: RetryPolicy::fixed(3, 1_000),
        all_ready: RetryPolicy::fixed(5, 10_000),
        node_started: RetryPolicy::fixed(5, 1_000),
        join_target: RetryPolicy::fixed(5, 1_000),
        cluster_info: RetryPolicy::fixed(3, 1_000),
        node_started_settle_ms: 1_000,
        log_archive_settle_ms: 1_000,
        initial_validator_settle_ms: 1_000,
        post_restart_settle_ms: 1_000,
        ..PolicyConfig::default()
    }
}

/// Three nodes, all three layers enabled, data transaction monitoring off,
/// alerts on.
pub fn sample_config() -> ControllerConfig {
    let layers: BTreeMap<Layer, LayerConfig> = Layer::ALL
        .into_iter()
        .map(|layer| (layer, layer_config(layer)))
        .collect();

    ControllerConfig {
        network: NetworkConfig {
            name: "integrationnet".to_string(),
            backend_url: None,
            reference_nodes: None,
        },
        cluster: ClusterConfig {
            id: CLUSTER_ID.to_string(),
            name: "Fixture".to_string(),
            include_currency_l1: true,
            include_data_l1: true,
            monitor_data_l1_transactions: false,
            force_restart: false,
            app_env: "integrationnet".to_string(),
            collateral: 0,
            layers,
        },
        topology: sample_topology(),
        policy: fast_policy(),
        alerts: AlertConfig {
            enabled: true,
            ..AlertConfig::default()
        },
        remote: Default::default(),
        storage: Default::default(),
    }
}

/// Mark every node of `layer` Ready and publish a full `/cluster/info`.
pub fn layer_healthy(mock: &MockEffects, config: &ControllerConfig, layer: Layer) {
    let port = public_port(layer);
    let members: Vec<ClusterMember> = config
        .topology
        .nodes()
        .map(|node| ClusterMember {
            id: MockEffects::peer_id(&node.ip),
            state: "Ready".to_string(),
        })
        .collect();
    for node in config.topology.nodes() {
        mock.set_node_ready(&node.ip, port);
        mock.set_cluster_info(&node.ip, port, members.clone());
    }
}

/// A mock where the whole cluster of `config` is healthy: every enabled
/// layer Ready, snapshots one minute old, the first reference node holding
/// the latest global snapshot, and application blocks in the latest cluster
/// snapshot.
pub fn healthy_cluster(config: &ControllerConfig) -> MockEffects {
    let mock = MockEffects::new();
    for layer in config.enabled_layers() {
        layer_healthy(&mock, config, layer);
    }
    mock.set_snapshot_age_minutes(1);
    mock.set_global_snapshot(500, GLOBAL_HASH);
    mock.set_data_blocks(1_000, 3);
    if let Ok(nodes) = config.reference_nodes() {
        if let Some(first) = nodes.first() {
            mock.add_snapshot_holder(&first.ip);
        }
    }
    mock
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_config_is_valid() {
        let config = sample_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.enabled_layers().len(), 3);
        assert_eq!(config.topology.node_count(), 3);
    }
}
