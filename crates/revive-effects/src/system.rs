//! Composed production effect system.
//!
//! `ProductionEffects` bundles one handler per effect trait and is built once
//! per controller invocation from the loaded configuration. It is not meant
//! to be reused across invocations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use revive_core::config::NetworkName;
use revive_core::effects::{
    AlertEffects, AlertPayload, CommandReceipt, CredentialEffects, LedgerEffects,
    NodeHttpEffects, PhysicalTimeEffects, RemoteCommandEffects, RestartRecordEffects,
};
use revive_core::types::{
    ClusterMember, GlobalSnapshotInfo, NodeAddress, NodeInfo, SnapshotInfo, StoredRestartRecord,
};
use revive_core::{ControllerConfig, ReviveResult};

use crate::alerts::{LoggingAlertHandler, OpsgenieAlertHandler};
use crate::http::{HttpLedgerClient, HttpNodeClient};
use crate::records::FileRecordStore;
use crate::remote::SshCommandHandler;
use crate::secrets::FileSecretStore;
use crate::time::RealTimeHandler;

/// Every production handler behind one value.
pub struct ProductionEffects {
    time: RealTimeHandler,
    nodes: HttpNodeClient,
    ledger: HttpLedgerClient,
    remote: SshCommandHandler,
    secrets: FileSecretStore,
    records: FileRecordStore,
    alerts: Box<dyn AlertEffects>,
}

impl std::fmt::Debug for ProductionEffects {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductionEffects")
            .field("ledger", &self.ledger)
            .field("records", &self.records)
            .finish_non_exhaustive()
    }
}

impl ProductionEffects {
    /// Build the handlers described by `config`.
    ///
    /// When alerting is enabled the Opsgenie API key is read from the secret
    /// store here, so a missing key fails the invocation up front.
    pub async fn from_config(config: &ControllerConfig) -> ReviveResult<Self> {
        let secrets = FileSecretStore::new(&config.storage.secret_dir);

        let alerts: Box<dyn AlertEffects> = if config.alerts.enabled {
            let api_key = secrets.secret(&config.alerts.api_key_path).await?;
            Box::new(OpsgenieAlertHandler::new(&config.alerts.api_url, api_key)?)
        } else {
            Box::new(LoggingAlertHandler)
        };

        let effects = Self {
            time: RealTimeHandler::new(),
            nodes: HttpNodeClient::new()?,
            ledger: HttpLedgerClient::new(config.network.backend_url.clone())?,
            remote: SshCommandHandler::new(&config.topology, &config.remote),
            secrets,
            records: FileRecordStore::new(&config.storage.record_dir),
            alerts,
        };
        tracing::debug!(
            records = %config.storage.record_dir.display(),
            alerts = config.alerts.enabled,
            "production effects ready"
        );
        Ok(effects)
    }

    /// The record store, for operator commands that bypass the controller.
    pub fn records(&self) -> &FileRecordStore {
        &self.records
    }
}

#[async_trait]
impl PhysicalTimeEffects for ProductionEffects {
    async fn now(&self) -> DateTime<Utc> {
        self.time.now().await
    }

    async fn sleep_ms(&self, ms: u64) {
        self.time.sleep_ms(ms).await;
    }
}

#[async_trait]
impl NodeHttpEffects for ProductionEffects {
    async fn node_info(&self, address: &NodeAddress) -> ReviveResult<NodeInfo> {
        self.nodes.node_info(address).await
    }

    async fn cluster_info(&self, address: &NodeAddress) -> ReviveResult<Vec<ClusterMember>> {
        self.nodes.cluster_info(address).await
    }

    async fn snapshot_data_blocks(
        &self,
        address: &NodeAddress,
        ordinal: u64,
    ) -> ReviveResult<usize> {
        self.nodes.snapshot_data_blocks(address, ordinal).await
    }

    async fn global_snapshot_exists(
        &self,
        address: &NodeAddress,
        hash: &str,
    ) -> ReviveResult<bool> {
        self.nodes.global_snapshot_exists(address, hash).await
    }
}

#[async_trait]
impl LedgerEffects for ProductionEffects {
    async fn latest_cluster_snapshot(
        &self,
        network: NetworkName,
        cluster_id: &str,
    ) -> ReviveResult<SnapshotInfo> {
        self.ledger.latest_cluster_snapshot(network, cluster_id).await
    }

    async fn latest_global_snapshot(
        &self,
        network: NetworkName,
    ) -> ReviveResult<GlobalSnapshotInfo> {
        self.ledger.latest_global_snapshot(network).await
    }
}

#[async_trait]
impl RemoteCommandEffects for ProductionEffects {
    async fn dispatch(
        &self,
        targets: &[String],
        commands: &[String],
    ) -> ReviveResult<CommandReceipt> {
        self.remote.dispatch(targets, commands).await
    }
}

#[async_trait]
impl CredentialEffects for ProductionEffects {
    async fn secret(&self, path: &str) -> ReviveResult<String> {
        self.secrets.secret(path).await
    }
}

#[async_trait]
impl RestartRecordEffects for ProductionEffects {
    async fn load_record(&self, cluster_id: &str) -> ReviveResult<Option<StoredRestartRecord>> {
        self.records.load_record(cluster_id).await
    }

    async fn create_record_if_absent(&self, record: &StoredRestartRecord) -> ReviveResult<bool> {
        self.records.create_record_if_absent(record).await
    }

    async fn replace_record_if(
        &self,
        expected: &StoredRestartRecord,
        record: &StoredRestartRecord,
    ) -> ReviveResult<bool> {
        self.records.replace_record_if(expected, record).await
    }

    async fn save_record(&self, record: &StoredRestartRecord) -> ReviveResult<()> {
        self.records.save_record(record).await
    }

    async fn delete_record(&self, cluster_id: &str) -> ReviveResult<()> {
        self.records.delete_record(cluster_id).await
    }
}

#[async_trait]
impl AlertEffects for ProductionEffects {
    async fn create_alert(&self, payload: &AlertPayload) -> ReviveResult<()> {
        self.alerts.create_alert(payload).await
    }

    async fn close_alert(&self, alias: &str) -> ReviveResult<()> {
        self.alerts.close_alert(alias).await
    }
}
