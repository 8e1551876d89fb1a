//! Node identities, addresses and health observations.

use super::layer::Layer;
use crate::errors::{ReviveError, ReviveResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A fleet member as configured in the topology.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeIdentity {
    /// Instance identifier used as the remote command target
    pub id: String,
    /// Reachable IP address
    pub ip: String,
}

impl NodeIdentity {
    /// Create a node identity.
    pub fn new(id: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ip: ip.into(),
        }
    }
}

/// An `ip:port` pair, the persisted form of an individual restart target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeAddress {
    /// Node IP
    pub ip: String,
    /// Public HTTP port of the layer being addressed
    pub port: u16,
}

impl NodeAddress {
    /// Create a node address.
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
        }
    }

    /// The `/node/info` URL for this address.
    pub fn node_info_url(&self) -> String {
        format!("http://{}:{}/node/info", self.ip, self.port)
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

impl FromStr for NodeAddress {
    type Err = ReviveError;

    fn from_str(s: &str) -> ReviveResult<Self> {
        let (ip, port) = s
            .trim()
            .rsplit_once(':')
            .ok_or_else(|| ReviveError::corrupt_record(format!("address without port: {s}")))?;
        if ip.is_empty() {
            return Err(ReviveError::corrupt_record(format!(
                "address without ip: {s}"
            )));
        }
        let port = port
            .parse::<u16>()
            .map_err(|e| ReviveError::corrupt_record(format!("bad port in {s}: {e}")))?;
        Ok(Self::new(ip, port))
    }
}

/// Readiness of a node as reported by `/node/info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeHealth {
    /// Reachable and reporting `Ready`
    Ready,
    /// Reachable but in any other state
    NotReady,
    /// No response within the probe budget
    Unreachable,
}

impl NodeHealth {
    /// Whether the node counts as healthy.
    pub fn is_ready(self) -> bool {
        matches!(self, NodeHealth::Ready)
    }
}

/// Ephemeral per-probe observation of one node on one layer. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeHealthRecord {
    /// Layer probed
    pub layer: Layer,
    /// Node IP
    pub ip: String,
    /// Public port probed
    pub port: u16,
    /// Instance id of the node
    pub id: String,
    /// Observed health
    pub state: NodeHealth,
}

impl NodeHealthRecord {
    /// The address this record was probed at.
    pub fn address(&self) -> NodeAddress {
        NodeAddress::new(self.ip.clone(), self.port)
    }
}

/// Body of `GET /node/info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    /// Peer id of the node
    pub id: String,
    /// Node state string, `Ready` when serving
    pub state: String,
    /// Host the node advertises
    #[serde(default)]
    pub host: String,
    /// Peer-to-peer port the node advertises
    #[serde(default)]
    pub p2p_port: u16,
}

impl NodeInfo {
    /// Whether the node reports `Ready`.
    pub fn is_ready(&self) -> bool {
        self.state == "Ready"
    }
}

/// One entry of `GET /cluster/info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMember {
    /// Peer id
    pub id: String,
    /// Member state string
    pub state: String,
}

impl ClusterMember {
    /// Whether the member reports `Ready`.
    pub fn is_ready(&self) -> bool {
        self.state == "Ready"
    }
}

/// A running peer that a restarted node can join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinPeer {
    /// Peer id
    pub id: String,
    /// Host to dial
    pub host: String,
    /// Peer-to-peer port
    pub p2p_port: u16,
}

impl From<NodeInfo> for JoinPeer {
    fn from(info: NodeInfo) -> Self {
        Self {
            id: info.id,
            host: info.host,
            p2p_port: info.p2p_port,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_parses_and_prints() {
        let addr: NodeAddress = "10.0.0.2:9000".parse().expect("valid address");
        assert_eq!(addr, NodeAddress::new("10.0.0.2", 9000));
        assert_eq!(addr.to_string(), "10.0.0.2:9000");
    }

    #[test]
    fn address_rejects_garbage() {
        assert!("10.0.0.2".parse::<NodeAddress>().is_err());
        assert!(":9000".parse::<NodeAddress>().is_err());
        assert!("10.0.0.2:http".parse::<NodeAddress>().is_err());
    }

    #[test]
    fn node_info_decodes_camel_case() {
        let info: NodeInfo = serde_json::from_str(
            r#"{"id":"abc","state":"Ready","host":"10.0.0.1","p2pPort":9001,"extra":1}"#,
        )
        .expect("decodes");
        assert!(info.is_ready());
        assert_eq!(JoinPeer::from(info).p2p_port, 9001);
    }
}
