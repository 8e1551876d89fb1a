//! Shell command builders for the remote command channel.
//!
//! Every builder is pure and returns the command list of one dispatch.
//! Values that come from configuration or secrets are single-quoted before
//! they reach the shell.

use chrono::{DateTime, Utc};
use revive_core::config::ClusterConfig;
use revive_core::effects::NodeCredentials;
use revive_core::types::JoinPeer;
use revive_core::{Layer, LayerConfig, ReferenceNode};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Quote `value` for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn timestamp(now: DateTime<Utc>) -> String {
    now.format(TIMESTAMP_FORMAT).to_string()
}

/// Kill whatever listens on `port`.
pub fn stop_layer(port: u16) -> Vec<String> {
    vec![format!("fuser -k {port}/tcp")]
}

/// Kill the processes of every listed port.
pub fn stop_layers(ports: &[u16]) -> Vec<String> {
    ports.iter().flat_map(|port| stop_layer(*port)).collect()
}

/// Zip the `logs` directory of a layer into `../restart_logs` and remove it.
///
/// One chained command: the logs are removed only once the archive is in
/// place.
pub fn archive_logs(layer: Layer, settings: &LayerConfig, now: DateTime<Utc>) -> Vec<String> {
    let name = format!("{}-{}.zip", timestamp(now), layer.key_segment());
    vec![format!(
        "cd {} && mkdir -p ../restart_logs && zip -r {name} logs && mv {name} ../restart_logs && rm -r logs",
        shell_quote(&settings.directory)
    )]
}

/// Move incremental snapshots `from..=to` of the L0 data directory aside.
///
/// Entries are moved together with every hard link pointing at them and are
/// never deleted.
pub fn backup_snapshots(l0: &LayerConfig, from: u64, to: u64, now: DateTime<Utc>) -> Vec<String> {
    let target = format!("data/incremental_snapshot_bkp_{}", timestamp(now));
    vec![
        format!("cd {}", shell_quote(&l0.directory)),
        format!("mkdir -p {target}"),
        format!(
            "for i in $(seq {from} {to}); do \
             src=data/incremental_snapshot/$i; \
             if [ -e \"$src\" ]; then \
             find data/incremental_snapshot -mount -samefile \"$src\" -exec mv {{}} {target}/ \\;; \
             fi; \
             done"
        ),
    ]
}

/// How a node process is launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Genesis L0 rebuilding state from the reference node
    Rollback,
    /// Any node joining an existing cluster
    Validator,
    /// Genesis of an application layer, forming a new cluster
    InitialValidator,
}

impl StartMode {
    /// Node command line argument.
    pub fn as_arg(self) -> &'static str {
        match self {
            StartMode::Rollback => "run-rollback",
            StartMode::Validator => "run-validator",
            StartMode::InitialValidator => "run-initial-validator",
        }
    }
}

/// L0 peer an application layer node talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct L0Peer {
    /// Peer id
    pub id: String,
    /// Host of the peer
    pub host: String,
    /// Public HTTP port of the peer
    pub http_port: u16,
}

/// Everything needed to start one node process.
#[derive(Debug, Clone)]
pub struct StartSpec<'a> {
    /// Layer to start
    pub layer: Layer,
    /// Layer settings
    pub settings: &'a LayerConfig,
    /// Launch mode
    pub mode: StartMode,
    /// IP the node advertises
    pub node_ip: &'a str,
    /// Key material of the node on this layer
    pub credentials: &'a NodeCredentials,
    /// Global L0 peer
    pub reference: &'a ReferenceNode,
    /// L0 peer, application layers only
    pub l0_peer: Option<&'a L0Peer>,
    /// Cluster settings
    pub cluster: &'a ClusterConfig,
}

fn export(name: &str, value: &str) -> String {
    format!("export {name}={}", shell_quote(value))
}

/// Export the node environment, then launch the jar in the background.
pub fn start_node(spec: &StartSpec<'_>) -> Vec<String> {
    let settings = spec.settings;
    let mut commands = vec![
        export("CL_KEYSTORE", &spec.credentials.keystore),
        export("CL_KEYALIAS", &spec.credentials.alias),
        export("CL_PASSWORD", &spec.credentials.password),
        export("CL_PUBLIC_HTTP_PORT", &settings.public_port.to_string()),
        export("CL_P2P_HTTP_PORT", &settings.p2p_port.to_string()),
        export("CL_CLI_HTTP_PORT", &settings.cli_port.to_string()),
        export("CL_GLOBAL_L0_PEER_HTTP_HOST", &spec.reference.ip),
        export("CL_GLOBAL_L0_PEER_HTTP_PORT", &spec.reference.port.to_string()),
        export("CL_GLOBAL_L0_PEER_ID", &spec.reference.id),
    ];

    if let Some(peer) = spec.l0_peer.filter(|_| spec.layer.is_application_layer()) {
        commands.push(export("CL_L0_PEER_HTTP_HOST", &peer.host));
        commands.push(export("CL_L0_PEER_HTTP_PORT", &peer.http_port.to_string()));
        commands.push(export("CL_L0_PEER_ID", &peer.id));
    }

    commands.push(export("CL_L0_TOKEN_IDENTIFIER", &spec.cluster.id));
    commands.push(export("CL_APP_ENV", &spec.cluster.app_env));
    commands.push(export("CL_COLLATERAL", &spec.cluster.collateral.to_string()));

    // Entries are validated as NAME=value when the config is loaded.
    for (name, value) in settings.env.iter().filter_map(|entry| entry.split_once('=')) {
        commands.push(export(name, value));
    }

    commands.push(format!("cd {}", shell_quote(&settings.directory)));

    let mut seedlist = String::new();
    if let Some(url) = &settings.seedlist_url {
        commands.push(format!("curl -sSfL {} -o seedlist", shell_quote(url)));
        seedlist.push_str(" --seedlist seedlist");
    }

    commands.push(format!(
        "nohup java -jar {} {}{seedlist} --ip {} > node.log 2>&1 &",
        shell_quote(&settings.jar),
        spec.mode.as_arg(),
        shell_quote(spec.node_ip),
    ));
    commands
}

/// Ask the local node to join `peer`.
pub fn join_cluster(cli_port: u16, peer: &JoinPeer) -> Vec<String> {
    let body = serde_json::json!({
        "id": peer.id,
        "ip": peer.host,
        "p2pPort": peer.p2p_port,
    });
    vec![format!(
        "curl -sS -X POST http://localhost:{cli_port}/cluster/join \
         -H 'Content-Type: application/json' -d {}",
        shell_quote(&body.to_string())
    )]
}
