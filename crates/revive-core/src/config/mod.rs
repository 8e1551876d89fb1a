//! Controller configuration.
//!
//! One TOML document describes the managed cluster, the network it runs on
//! and every timing constant the restart engine uses. Nothing in here is
//! mutated by the engine; a fresh `ControllerConfig` is loaded per
//! invocation.

pub mod network;
pub mod validation;

pub use network::{NetworkName, ReferenceNode};
pub use validation::{ConfigValidator, ValidationError};

use crate::errors::{ReviveError, ReviveResult};
use crate::retry::RetryPolicy;
use crate::types::{ClusterTopology, Layer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Top-level configuration of one controller invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Network the cluster runs on
    pub network: NetworkConfig,
    /// The managed cluster
    pub cluster: ClusterConfig,
    /// Machines of the cluster
    pub topology: ClusterTopology,
    /// Thresholds, retry budgets and settle delays
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Alert sink settings
    #[serde(default)]
    pub alerts: AlertConfig,
    /// Remote command channel settings
    #[serde(default)]
    pub remote: RemoteConfig,
    /// Local state directories
    #[serde(default)]
    pub storage: StorageConfig,
}

/// `[network]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// `mainnet`, `integrationnet` or `testnet`
    pub name: String,
    /// Ledger backend base URL, defaults to the public backend of the network
    #[serde(default)]
    pub backend_url: Option<String>,
    /// Reference source nodes in priority order, defaults to the built-in table
    #[serde(default)]
    pub reference_nodes: Option<Vec<ReferenceNode>>,
}

/// `[cluster]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Cluster (metagraph) id, also the restart record key
    pub id: String,
    /// Human readable name used in alerts
    pub name: String,
    /// Whether the currency L1 layer runs
    #[serde(default)]
    pub include_currency_l1: bool,
    /// Whether the data L1 layer runs
    #[serde(default)]
    pub include_data_l1: bool,
    /// Whether to restart the data layer when it stops carrying blocks
    #[serde(default)]
    pub monitor_data_l1_transactions: bool,
    /// Operator override: always start a fresh full cluster restart
    #[serde(default)]
    pub force_restart: bool,
    /// Value of `CL_APP_ENV` on started nodes
    #[serde(default)]
    pub app_env: String,
    /// Value of `CL_COLLATERAL` on started nodes
    #[serde(default)]
    pub collateral: u64,
    /// Per-layer process settings, keyed `l0`, `currency-l1`, `data-l1`
    #[serde(default)]
    pub layers: BTreeMap<Layer, LayerConfig>,
}

/// `[cluster.layers.<layer>]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Public HTTP port (health probes)
    pub public_port: u16,
    /// Peer-to-peer port
    pub p2p_port: u16,
    /// Local CLI port (join requests)
    pub cli_port: u16,
    /// Base directory of the layer on every node
    pub directory: String,
    /// Jar file name inside `directory`
    pub jar: String,
    /// Additional `NAME=value` pairs exported before start
    #[serde(default)]
    pub env: Vec<String>,
    /// Seedlist to download and pass with `--seedlist`
    #[serde(default)]
    pub seedlist_url: Option<String>,
}

/// `[policy]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Snapshot age, in minutes, above which the cluster counts as stalled
    pub stall_threshold_minutes: i64,
    /// Minutes after the last transition at which an episode is abandoned
    pub episode_timeout_minutes: i64,
    /// Number of recent snapshots inspected for application blocks
    pub data_snapshot_window: u64,
    /// Per-node probe budget while classifying health
    pub health_probe: RetryPolicy,
    /// Budget of the all-nodes-ready wait
    pub all_ready: RetryPolicy,
    /// Budget of the wait for a started process to answer
    pub node_started: RetryPolicy,
    /// Budget of the live join target discovery
    pub join_target: RetryPolicy,
    /// Budget of the post-restart `/cluster/info` check
    pub cluster_info: RetryPolicy,
    /// Pause after a started node first answers
    pub node_started_settle_ms: u64,
    /// Pause after dispatching log archiving
    pub log_archive_settle_ms: u64,
    /// Pause after starting an L1 initial validator
    pub initial_validator_settle_ms: u64,
    /// Pause before checking for fresh snapshots after a restart
    pub post_restart_settle_ms: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            stall_threshold_minutes: 4,
            episode_timeout_minutes: 240,
            data_snapshot_window: 10,
            health_probe: RetryPolicy::fixed(10, 3_000),
            all_ready: RetryPolicy::fixed(20, 10_000),
            node_started: RetryPolicy::fixed(50, 1_000),
            join_target: RetryPolicy::fixed(60, 1_000),
            cluster_info: RetryPolicy::fixed(10, 5_000),
            node_started_settle_ms: 10_000,
            log_archive_settle_ms: 10_000,
            initial_validator_settle_ms: 10_000,
            post_restart_settle_ms: 10_000,
        }
    }
}

/// `[alerts]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Send alerts to Opsgenie; when false alerts are only logged
    pub enabled: bool,
    /// Opsgenie alerts endpoint
    pub api_url: String,
    /// Secret path of the Opsgenie API key
    pub api_key_path: String,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: "https://api.opsgenie.com/v2/alerts".to_string(),
            api_key_path: "/metagraph-nodes/opsgenie-api-key".to_string(),
        }
    }
}

/// `[remote]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// SSH login user on every node
    pub ssh_user: String,
    /// Extra arguments passed to `ssh`
    pub ssh_options: Vec<String>,
    /// Seconds a dispatched command may run before it is killed
    pub command_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            ssh_user: "ubuntu".to_string(),
            ssh_options: vec![
                "-o".to_string(),
                "StrictHostKeyChecking=no".to_string(),
                "-o".to_string(),
                "BatchMode=yes".to_string(),
            ],
            command_timeout_secs: 120,
        }
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one JSON restart record per cluster
    pub record_dir: PathBuf,
    /// Root of the file-backed secret store
    pub secret_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            record_dir: PathBuf::from("state/records"),
            secret_dir: PathBuf::from("state/secrets"),
        }
    }
}

/// `NAME=value` where NAME is a valid shell variable name.
fn is_env_assignment(entry: &str) -> bool {
    let Some((name, _)) = entry.split_once('=') else {
        return false;
    };
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl ControllerConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> ReviveResult<Self> {
        toml::from_str(content).map_err(|e| ReviveError::invalid(format!("invalid TOML: {e}")))
    }

    /// Read and parse a TOML file.
    pub fn load_from_file(path: &Path) -> ReviveResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ReviveError::invalid(format!(
                "failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Pre-flight validation. Every failure is fatal for the invocation.
    pub fn validate(&self) -> ReviveResult<()> {
        let mut root = ConfigValidator::new();

        let mut network = root.for_field("network");
        network.custom(
            "name",
            self.network.name.parse::<NetworkName>().is_ok(),
            format!("unsupported network '{}'", self.network.name),
        );
        if let Some(nodes) = &self.network.reference_nodes {
            network.custom(
                "reference_nodes",
                !nodes.is_empty(),
                "at least one reference node is required",
            );
        }
        root.merge(network);

        let mut cluster = root.for_field("cluster");
        cluster.non_empty("id", &self.cluster.id);
        for layer in self.enabled_layers() {
            let mut section = cluster.for_field(&format!("layers.{layer}"));
            match self.cluster.layers.get(&layer) {
                Some(settings) => {
                    section
                        .non_zero("public_port", settings.public_port)
                        .non_zero("p2p_port", settings.p2p_port)
                        .non_zero("cli_port", settings.cli_port)
                        .non_empty("directory", &settings.directory)
                        .non_empty("jar", &settings.jar);
                    for (index, entry) in settings.env.iter().enumerate() {
                        section.custom(
                            &format!("env[{index}]"),
                            is_env_assignment(entry),
                            format!("'{entry}' is not NAME=value with a shell variable name"),
                        );
                    }
                }
                None => {
                    section.custom("", false, "layer is enabled but not configured");
                }
            }
            cluster.merge(section);
        }
        root.merge(cluster);

        let mut topology = root.for_field("topology");
        topology
            .non_empty("genesis.id", &self.topology.genesis.id)
            .non_empty("genesis.ip", &self.topology.genesis.ip)
            .custom(
                "validators",
                !self.topology.validators.is_empty(),
                "at least one validator is required",
            );
        for (index, validator) in self.topology.validators.iter().enumerate() {
            topology
                .non_empty(&format!("validators[{index}].id"), &validator.id)
                .non_empty(&format!("validators[{index}].ip"), &validator.ip);
        }
        let mut seen = HashSet::new();
        let distinct = self.topology.nodes().all(|n| seen.insert(n.id.as_str()));
        topology.custom("validators", distinct, "node ids must be distinct");
        root.merge(topology);

        let mut policy = root.for_field("policy");
        policy
            .non_zero("episode_timeout_minutes", self.policy.episode_timeout_minutes)
            .non_zero("stall_threshold_minutes", self.policy.stall_threshold_minutes)
            .non_zero("data_snapshot_window", self.policy.data_snapshot_window)
            .non_zero("health_probe.max_attempts", self.policy.health_probe.max_attempts)
            .non_zero("all_ready.max_attempts", self.policy.all_ready.max_attempts)
            .non_zero("node_started.max_attempts", self.policy.node_started.max_attempts)
            .non_zero("join_target.max_attempts", self.policy.join_target.max_attempts)
            .non_zero("cluster_info.max_attempts", self.policy.cluster_info.max_attempts);
        root.merge(policy);

        root.finish()
    }

    /// The parsed network name.
    pub fn network_name(&self) -> ReviveResult<NetworkName> {
        self.network.name.parse()
    }

    /// Ledger backend base URL without a trailing slash.
    pub fn backend_url(&self) -> ReviveResult<String> {
        match &self.network.backend_url {
            Some(url) => Ok(url.trim_end_matches('/').to_string()),
            None => Ok(self.network_name()?.default_backend_url()),
        }
    }

    /// Reference source nodes in priority order.
    pub fn reference_nodes(&self) -> ReviveResult<Vec<ReferenceNode>> {
        match &self.network.reference_nodes {
            Some(nodes) => Ok(nodes.clone()),
            None => Ok(self.network_name()?.reference_nodes()),
        }
    }

    /// L0 plus whichever application layers are enabled, in bring-up order.
    pub fn enabled_layers(&self) -> Vec<Layer> {
        Layer::ALL
            .into_iter()
            .filter(|layer| self.is_layer_enabled(*layer))
            .collect()
    }

    /// Whether `layer` runs on this cluster.
    pub fn is_layer_enabled(&self, layer: Layer) -> bool {
        match layer {
            Layer::L0 => true,
            Layer::CurrencyL1 => self.cluster.include_currency_l1,
            Layer::DataL1 => self.cluster.include_data_l1,
        }
    }

    /// Settings of `layer`.
    pub fn layer(&self, layer: Layer) -> ReviveResult<&LayerConfig> {
        self.cluster
            .layers
            .get(&layer)
            .ok_or_else(|| ReviveError::invalid(format!("layer {layer} is not configured")))
    }

    /// Public HTTP port of `layer`.
    pub fn public_port(&self, layer: Layer) -> ReviveResult<u16> {
        Ok(self.layer(layer)?.public_port)
    }

    /// Which layer serves on `port`, among the enabled layers.
    pub fn layer_for_port(&self, port: u16) -> Option<Layer> {
        self.enabled_layers().into_iter().find(|layer| {
            self.cluster
                .layers
                .get(layer)
                .is_some_and(|settings| settings.public_port == port)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [network]
        name = "integrationnet"

        [cluster]
        id = "DAG0metagraph"
        name = "Sample"
        include_currency_l1 = true

        [cluster.layers.l0]
        public_port = 7000
        p2p_port = 7001
        cli_port = 7002
        directory = "/home/ubuntu/code/metagraph-l0"
        jar = "metagraph-l0.jar"

        [cluster.layers.currency-l1]
        public_port = 8000
        p2p_port = 8001
        cli_port = 8002
        directory = "/home/ubuntu/code/currency-l1"
        jar = "currency-l1.jar"
        env = ["CL_EXTRA=1"]

        [topology.genesis]
        id = "i-genesis"
        ip = "10.0.0.1"

        [[topology.validators]]
        id = "i-v1"
        ip = "10.0.0.2"

        [[topology.validators]]
        id = "i-v2"
        ip = "10.0.0.3"

        [policy]
        episode_timeout_minutes = 60
    "#;

    #[test]
    fn sample_config_loads_and_validates() {
        let config = ControllerConfig::from_toml_str(SAMPLE).expect("parses");
        config.validate().expect("valid");

        assert_eq!(config.enabled_layers(), vec![Layer::L0, Layer::CurrencyL1]);
        assert_eq!(config.policy.episode_timeout_minutes, 60);
        assert_eq!(config.policy.stall_threshold_minutes, 4);
        assert_eq!(config.layer_for_port(8000), Some(Layer::CurrencyL1));
        assert_eq!(
            config.backend_url().expect("url"),
            "https://be-integrationnet.constellationnetwork.io"
        );
        assert_eq!(config.reference_nodes().expect("nodes").len(), 3);
    }

    #[test]
    fn unsupported_network_is_invalid() {
        let mut config = ControllerConfig::from_toml_str(SAMPLE).expect("parses");
        config.network.name = "devnet".into();
        let err = config.validate().expect_err("must fail");
        assert!(matches!(err, ReviveError::Invalid { .. }));
        assert!(err.message().contains("network.name"));
    }

    #[test]
    fn enabled_layer_without_settings_is_invalid() {
        let mut config = ControllerConfig::from_toml_str(SAMPLE).expect("parses");
        config.cluster.include_data_l1 = true;
        let err = config.validate().expect_err("must fail");
        assert!(err.message().contains("layers.data-l1"));
    }

    #[test]
    fn duplicate_node_ids_are_invalid() {
        let mut config = ControllerConfig::from_toml_str(SAMPLE).expect("parses");
        config.topology.validators[1].id = "i-v1".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_entries_need_a_shell_variable_name() {
        for bad in ["CL_EXTRA", "1ABC=x", "A B=x", "$(reboot)=x", "=x"] {
            let mut config = ControllerConfig::from_toml_str(SAMPLE).expect("parses");
            if let Some(l1) = config.cluster.layers.get_mut(&Layer::CurrencyL1) {
                l1.env = vec![bad.to_string()];
            }
            let err = config.validate().expect_err(bad);
            assert!(err.message().contains("layers.currency-l1.env[0]"), "{bad}");
        }
    }

    #[test]
    fn env_values_may_hold_anything() {
        assert!(is_env_assignment("_JAVA_OPTS=-Xmx2g -Dkey=a=b"));
        assert!(is_env_assignment("EMPTY="));
        assert!(!is_env_assignment("export X=1"));
    }
}
