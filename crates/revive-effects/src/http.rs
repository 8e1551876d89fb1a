//! HTTP handlers for the node endpoints and the ledger backend.

use async_trait::async_trait;
use revive_core::config::NetworkName;
use revive_core::effects::{LedgerEffects, NodeHttpEffects};
use revive_core::types::{ClusterMember, GlobalSnapshotInfo, NodeAddress, NodeInfo, SnapshotInfo};
use revive_core::{ReviveError, ReviveResult};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Map a transport failure onto the unified error.
pub fn network_error(url: &str, err: reqwest::Error) -> ReviveError {
    if err.is_timeout() {
        ReviveError::timeout(format!("request to {url} timed out"))
    } else if err.is_decode() {
        ReviveError::serialization(format!("unexpected response from {url}: {err}"))
    } else {
        ReviveError::network(format!("request to {url} failed: {err}"))
    }
}

fn build_client(timeout: Duration) -> ReviveResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ReviveError::internal(format!("failed to build HTTP client: {e}")))
}

async fn get_json<T: DeserializeOwned>(client: &reqwest::Client, url: &str) -> ReviveResult<T> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| network_error(url, e))?;

    if !response.status().is_success() {
        return Err(ReviveError::network(format!(
            "{url} returned {}",
            response.status()
        )));
    }

    response.json::<T>().await.map_err(|e| network_error(url, e))
}

/// Number of application blocks in a `/snapshots/{ordinal}` body.
///
/// Snapshots without a data application section carry no blocks.
pub fn count_data_blocks(body: &serde_json::Value) -> usize {
    body.pointer("/value/dataApplication/blocks")
        .and_then(serde_json::Value::as_array)
        .map_or(0, Vec::len)
}

/// Client for the public HTTP endpoints of cluster nodes.
#[derive(Debug, Clone)]
pub struct HttpNodeClient {
    client: reqwest::Client,
}

impl HttpNodeClient {
    /// Create a client with the default per-request timeout.
    pub fn new() -> ReviveResult<Self> {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a client with a custom per-request timeout.
    pub fn with_timeout(timeout: Duration) -> ReviveResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl NodeHttpEffects for HttpNodeClient {
    async fn node_info(&self, address: &NodeAddress) -> ReviveResult<NodeInfo> {
        get_json(&self.client, &address.node_info_url()).await
    }

    async fn cluster_info(&self, address: &NodeAddress) -> ReviveResult<Vec<ClusterMember>> {
        let url = format!("http://{address}/cluster/info");
        get_json(&self.client, &url).await
    }

    async fn snapshot_data_blocks(
        &self,
        address: &NodeAddress,
        ordinal: u64,
    ) -> ReviveResult<usize> {
        let url = format!("http://{address}/snapshots/{ordinal}");
        let body: serde_json::Value = get_json(&self.client, &url).await?;
        Ok(count_data_blocks(&body))
    }

    async fn global_snapshot_exists(
        &self,
        address: &NodeAddress,
        hash: &str,
    ) -> ReviveResult<bool> {
        let url = format!("http://{address}/global-snapshots/{hash}");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| network_error(&url, e))?;

        if response.status().is_success() {
            return Ok(true);
        }
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Err(ReviveError::network(format!(
            "{url} returned {}",
            response.status()
        )))
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

/// Client for the network's ledger backend.
#[derive(Debug, Clone)]
pub struct HttpLedgerClient {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl HttpLedgerClient {
    /// Create a client. Without `base_url` the public backend of the
    /// requested network is used.
    pub fn new(base_url: Option<String>) -> ReviveResult<Self> {
        Ok(Self {
            client: build_client(DEFAULT_REQUEST_TIMEOUT)?,
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
        })
    }

    fn base_url(&self, network: NetworkName) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| network.default_backend_url())
    }
}

#[async_trait]
impl LedgerEffects for HttpLedgerClient {
    async fn latest_cluster_snapshot(
        &self,
        network: NetworkName,
        cluster_id: &str,
    ) -> ReviveResult<SnapshotInfo> {
        let url = format!(
            "{}/currency/{cluster_id}/snapshots/latest",
            self.base_url(network)
        );
        let envelope: Envelope<SnapshotInfo> = get_json(&self.client, &url).await?;
        tracing::debug!(
            cluster_id,
            ordinal = envelope.data.ordinal,
            timestamp = %envelope.data.timestamp,
            "latest cluster snapshot"
        );
        Ok(envelope.data)
    }

    async fn latest_global_snapshot(
        &self,
        network: NetworkName,
    ) -> ReviveResult<GlobalSnapshotInfo> {
        let url = format!("{}/global-snapshots/latest", self.base_url(network));
        let envelope: Envelope<GlobalSnapshotInfo> = get_json(&self.client, &url).await?;
        tracing::debug!(
            %network,
            ordinal = envelope.data.ordinal,
            hash = %envelope.data.hash,
            "latest global snapshot"
        );
        Ok(envelope.data)
    }
}
