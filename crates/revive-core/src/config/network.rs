//! Supported networks and their well-known reference source nodes.

use crate::errors::{ReviveError, ReviveResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Network a cluster is deployed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkName {
    /// Production network
    Mainnet,
    /// Pre-production network
    Integrationnet,
    /// Public test network
    Testnet,
}

impl NetworkName {
    /// Lowercase name as used in backend hostnames.
    pub fn as_str(self) -> &'static str {
        match self {
            NetworkName::Mainnet => "mainnet",
            NetworkName::Integrationnet => "integrationnet",
            NetworkName::Testnet => "testnet",
        }
    }

    /// Default ledger backend base URL.
    pub fn default_backend_url(self) -> String {
        format!("https://be-{}.constellationnetwork.io", self.as_str())
    }

    /// Environment tag attached to alerts.
    pub fn alert_tag(self) -> &'static str {
        match self {
            NetworkName::Mainnet => "env:MainNet",
            NetworkName::Integrationnet => "env:IntegrationNet",
            NetworkName::Testnet => "env:TestNet",
        }
    }

    /// Built-in reference source nodes in fixed priority order.
    pub fn reference_nodes(self) -> Vec<ReferenceNode> {
        let table: &[(&str, &str)] = match self {
            NetworkName::Testnet => &[
                ("13.57.186.140", TESTNET_INTEGRATIONNET_IDS[0]),
                ("54.193.165.70", TESTNET_INTEGRATIONNET_IDS[1]),
                ("54.177.255.227", TESTNET_INTEGRATIONNET_IDS[2]),
            ],
            NetworkName::Integrationnet => &[
                ("3.101.147.116", TESTNET_INTEGRATIONNET_IDS[0]),
                ("52.53.216.201", TESTNET_INTEGRATIONNET_IDS[1]),
                ("54.67.6.165", TESTNET_INTEGRATIONNET_IDS[2]),
            ],
            NetworkName::Mainnet => &[
                ("52.53.46.33", MAINNET_IDS[0]),
                ("54.215.18.98", MAINNET_IDS[1]),
                ("54.151.19.111", MAINNET_IDS[2]),
            ],
        };

        table
            .iter()
            .map(|(ip, id)| ReferenceNode {
                ip: (*ip).to_string(),
                port: REFERENCE_NODE_PORT,
                id: (*id).to_string(),
            })
            .collect()
    }
}

impl fmt::Display for NetworkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkName {
    type Err = ReviveError;

    fn from_str(s: &str) -> ReviveResult<Self> {
        match s {
            "mainnet" => Ok(NetworkName::Mainnet),
            "integrationnet" => Ok(NetworkName::Integrationnet),
            "testnet" => Ok(NetworkName::Testnet),
            other => Err(ReviveError::invalid(format!("unsupported network: {other}"))),
        }
    }
}

/// A well-connected peer of the global network, used as the rollback source
/// of truth and as the global L0 peer of every started node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceNode {
    /// Peer IP
    pub ip: String,
    /// Public HTTP port
    pub port: u16,
    /// Peer id
    pub id: String,
}

const REFERENCE_NODE_PORT: u16 = 9000;

const TESTNET_INTEGRATIONNET_IDS: [&str; 3] = [
    "e2f4496e5872682d7a55aa06e507a58e96b5d48a5286bfdff7ed780fa464d9e789b2760ecd840f4cb3ee6e1c1d81b2ee844c88dbebf149b1084b7313eb680714",
    "3458a688925a4bd89f2ac2c695362e44d2e0c2903bdbb41b341a4d39283b22d8c85b487bd33cc5d36dbe5e31b5b00a10a6eab802718ead4ed7192ade5a5d1941",
    "46daea11ca239cb8c0c8cdeb27db9dbe9c03744908a8a389a60d14df2ddde409260a93334d74957331eec1af323f458b12b3a6c3b8e05885608aae7e3a77eac7",
];

const MAINNET_IDS: [&str; 3] = [
    "e0c1ee6ec43510f0e16d2969a7a7c074a5c8cdb477c074fe9c32a9aad8cbc8ff1dff60bb81923e0db437d2686a9b65b86c403e6a21fa32b6acc4e61be4d70925",
    "629880a5b8d4cc6d12aec26f24230a463825c429723153aeaff29475b29e39d2406af0f8b034ba7798ae598dbd5f513d642bcbbeef088290abeadac61a0445d6",
    "710b3dc521b805aea7a798d61f5d4dae39601124f1f34fac9738a78047adeff60931ba522250226b87a2194d3b7d39da8d2cbffa35d6502c70f1a7e97132a4b0",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_network_has_three_reference_nodes() {
        for network in [
            NetworkName::Mainnet,
            NetworkName::Integrationnet,
            NetworkName::Testnet,
        ] {
            let nodes = network.reference_nodes();
            assert_eq!(nodes.len(), 3);
            assert!(nodes.iter().all(|n| n.port == 9000));
        }
    }

    #[test]
    fn unknown_network_is_rejected() {
        assert!("devnet".parse::<NetworkName>().is_err());
        assert_eq!(
            "integrationnet".parse::<NetworkName>().ok(),
            Some(NetworkName::Integrationnet)
        );
    }

    #[test]
    fn backend_url_follows_network_name() {
        assert_eq!(
            NetworkName::Testnet.default_backend_url(),
            "https://be-testnet.constellationnetwork.io"
        );
    }
}
