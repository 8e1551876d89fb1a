//! In-memory implementation of every effect trait.
//!
//! `MockEffects` is cheap to clone; clones share state, so a test can hand
//! one clone to the code under test and inspect another afterwards.
//!
//! - Time starts at a fixed instant and only moves when the code under test
//!   sleeps (or the test calls [`MockEffects::advance_minutes`]).
//! - Node responses are scripted per `ip:port`. A script is a queue; the last
//!   entry sticks once the others are consumed. Unscripted nodes are
//!   unreachable.
//! - Commands, alerts and record operations are recorded for assertions.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use revive_core::config::NetworkName;
use revive_core::effects::{
    AlertEffects, AlertPayload, CommandReceipt, CredentialEffects, LedgerEffects,
    NodeHttpEffects, PhysicalTimeEffects, RemoteCommandEffects, RestartRecordEffects,
};
use revive_core::types::{
    ClusterMember, GlobalSnapshotInfo, NodeAddress, NodeInfo, SnapshotInfo, StoredRestartRecord,
};
use revive_core::{ReviveError, ReviveResult};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// One scripted answer of `GET /node/info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeResponse {
    /// Reachable, reporting this state string
    State(String),
    /// Connection fails
    Unreachable,
}

impl NodeResponse {
    /// Reachable and `Ready`.
    pub fn ready() -> Self {
        NodeResponse::State("Ready".to_string())
    }

    /// Reachable but still starting up.
    pub fn starting() -> Self {
        NodeResponse::State("WaitingForDownload".to_string())
    }
}

/// A command batch submitted through the remote channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchedCommand {
    /// Receipt id handed back to the caller
    pub id: String,
    /// Target instance ids
    pub targets: Vec<String>,
    /// Commands, in order
    pub commands: Vec<String>,
}

impl DispatchedCommand {
    /// Whether any command of the batch contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.commands.iter().any(|c| c.contains(needle))
    }
}

#[derive(Debug)]
struct MockState {
    now: DateTime<Utc>,
    slept_ms: u64,
    nodes: HashMap<NodeAddress, VecDeque<NodeResponse>>,
    probes: HashMap<NodeAddress, u32>,
    cluster_info: HashMap<NodeAddress, Vec<ClusterMember>>,
    data_blocks: HashMap<u64, usize>,
    snapshot_holders: HashSet<String>,
    broken_references: HashSet<String>,
    cluster_snapshot_age_minutes: Option<i64>,
    cluster_ordinal: u64,
    global_snapshot: Option<GlobalSnapshotInfo>,
    dispatched: Vec<DispatchedCommand>,
    fail_dispatch: bool,
    secrets: HashMap<String, String>,
    records: BTreeMap<String, StoredRestartRecord>,
    concurrent_write: Option<StoredRestartRecord>,
    record_writes: u32,
    alerts: Vec<AlertPayload>,
    closed_alerts: Vec<String>,
}

/// Deterministic mock of the whole effect surface.
#[derive(Debug, Clone)]
pub struct MockEffects {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockEffects {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEffects {
    /// Fixed start instant of the mock clock: 2024-05-01T12:00:00Z.
    pub fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    /// Empty mock: no nodes reachable, no ledger data.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                now: Self::start_time(),
                slept_ms: 0,
                nodes: HashMap::new(),
                probes: HashMap::new(),
                cluster_info: HashMap::new(),
                data_blocks: HashMap::new(),
                snapshot_holders: HashSet::new(),
                broken_references: HashSet::new(),
                cluster_snapshot_age_minutes: None,
                cluster_ordinal: 1_000,
                global_snapshot: None,
                dispatched: Vec::new(),
                fail_dispatch: false,
                secrets: HashMap::new(),
                records: BTreeMap::new(),
                concurrent_write: None,
                record_writes: 0,
                alerts: Vec::new(),
                closed_alerts: Vec::new(),
            })),
        }
    }

    // --- clock ---

    /// Current mock time.
    pub fn current_time(&self) -> DateTime<Utc> {
        self.state.lock().now
    }

    /// Move the clock forward.
    pub fn advance_minutes(&self, minutes: i64) {
        self.state.lock().now += Duration::minutes(minutes);
    }

    /// Total time the code under test spent sleeping.
    pub fn slept_ms(&self) -> u64 {
        self.state.lock().slept_ms
    }

    // --- nodes ---

    /// Script `/node/info` answers for `ip:port`.
    pub fn script_node(&self, ip: &str, port: u16, responses: Vec<NodeResponse>) {
        self.state
            .lock()
            .nodes
            .insert(NodeAddress::new(ip, port), responses.into());
    }

    /// The node answers `Ready` from now on.
    pub fn set_node_ready(&self, ip: &str, port: u16) {
        self.script_node(ip, port, vec![NodeResponse::ready()]);
    }

    /// The node answers with `state` from now on.
    pub fn set_node_state(&self, ip: &str, port: u16, state: &str) {
        self.script_node(ip, port, vec![NodeResponse::State(state.to_string())]);
    }

    /// The node cannot be reached from now on.
    pub fn set_node_unreachable(&self, ip: &str, port: u16) {
        self.script_node(ip, port, vec![NodeResponse::Unreachable]);
    }

    /// Number of `/node/info` calls made against `ip:port`.
    pub fn probe_count(&self, ip: &str, port: u16) -> u32 {
        self.state
            .lock()
            .probes
            .get(&NodeAddress::new(ip, port))
            .copied()
            .unwrap_or(0)
    }

    /// Peer id the mock reports for a node.
    pub fn peer_id(ip: &str) -> String {
        format!("peer-{ip}")
    }

    /// Script `/cluster/info` of `ip:port`.
    pub fn set_cluster_info(&self, ip: &str, port: u16, members: Vec<ClusterMember>) {
        self.state
            .lock()
            .cluster_info
            .insert(NodeAddress::new(ip, port), members);
    }

    /// Number of application blocks in the cluster snapshot at `ordinal`.
    pub fn set_data_blocks(&self, ordinal: u64, blocks: usize) {
        self.state.lock().data_blocks.insert(ordinal, blocks);
    }

    /// The reference node at `ip` holds the latest global snapshot.
    pub fn add_snapshot_holder(&self, ip: &str) {
        self.state.lock().snapshot_holders.insert(ip.to_string());
    }

    /// Snapshot lookups against the reference node at `ip` fail.
    pub fn break_reference_node(&self, ip: &str) {
        self.state.lock().broken_references.insert(ip.to_string());
    }

    // --- ledger ---

    /// The latest cluster snapshot is `minutes` old, measured against the
    /// mock clock at query time.
    pub fn set_snapshot_age_minutes(&self, minutes: i64) {
        self.state.lock().cluster_snapshot_age_minutes = Some(minutes);
    }

    /// Ordinal reported for the latest cluster snapshot.
    pub fn set_cluster_ordinal(&self, ordinal: u64) {
        self.state.lock().cluster_ordinal = ordinal;
    }

    /// The ledger backend stops answering cluster snapshot queries.
    pub fn clear_cluster_snapshot(&self) {
        self.state.lock().cluster_snapshot_age_minutes = None;
    }

    /// Latest global snapshot reported by the backend.
    pub fn set_global_snapshot(&self, ordinal: u64, hash: &str) {
        self.state.lock().global_snapshot = Some(GlobalSnapshotInfo {
            ordinal,
            hash: hash.to_string(),
        });
    }

    // --- commands ---

    /// Every command batch submitted so far.
    pub fn dispatched(&self) -> Vec<DispatchedCommand> {
        self.state.lock().dispatched.clone()
    }

    /// Batches containing a command that includes `needle`.
    pub fn dispatched_matching(&self, needle: &str) -> Vec<DispatchedCommand> {
        self.dispatched()
            .into_iter()
            .filter(|d| d.contains(needle))
            .collect()
    }

    /// Make every dispatch fail.
    pub fn fail_dispatch(&self, fail: bool) {
        self.state.lock().fail_dispatch = fail;
    }

    // --- secrets ---

    /// Store a secret.
    pub fn set_secret(&self, path: &str, value: &str) {
        self.state
            .lock()
            .secrets
            .insert(path.to_string(), value.to_string());
    }

    // --- records ---

    /// The stored record of `cluster_id`, if any.
    pub fn stored_record(&self, cluster_id: &str) -> Option<StoredRestartRecord> {
        self.state.lock().records.get(cluster_id).cloned()
    }

    /// Put a record in the store directly.
    pub fn insert_record(&self, record: StoredRestartRecord) {
        self.state.lock().records.insert(record.id.clone(), record);
    }

    /// Simulate another invocation writing `record` right after the next
    /// record load: that load still returns the old value.
    pub fn write_after_next_load(&self, record: StoredRestartRecord) {
        self.state.lock().concurrent_write = Some(record);
    }

    /// Number of successful creates, replaces and saves.
    pub fn record_writes(&self) -> u32 {
        self.state.lock().record_writes
    }

    // --- alerts ---

    /// Alerts created so far.
    pub fn alerts(&self) -> Vec<AlertPayload> {
        self.state.lock().alerts.clone()
    }

    /// Aliases closed so far.
    pub fn closed_alerts(&self) -> Vec<String> {
        self.state.lock().closed_alerts.clone()
    }

    /// Forget recorded commands and alerts, keeping scripts and records.
    pub fn clear_history(&self) {
        let mut state = self.state.lock();
        state.dispatched.clear();
        state.alerts.clear();
        state.closed_alerts.clear();
        state.probes.clear();
    }
}

#[async_trait]
impl PhysicalTimeEffects for MockEffects {
    async fn now(&self) -> DateTime<Utc> {
        self.state.lock().now
    }

    async fn sleep_ms(&self, ms: u64) {
        let mut state = self.state.lock();
        state.slept_ms += ms;
        state.now += Duration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX / 1_000_000));
    }
}

#[async_trait]
impl NodeHttpEffects for MockEffects {
    async fn node_info(&self, address: &NodeAddress) -> ReviveResult<NodeInfo> {
        let mut state = self.state.lock();
        *state.probes.entry(address.clone()).or_default() += 1;

        let response = match state.nodes.get_mut(address) {
            Some(script) if script.len() > 1 => script.pop_front(),
            Some(script) => script.front().cloned(),
            None => None,
        };

        match response {
            Some(NodeResponse::State(node_state)) => Ok(NodeInfo {
                id: Self::peer_id(&address.ip),
                state: node_state,
                host: address.ip.clone(),
                p2p_port: address.port.saturating_add(1),
            }),
            Some(NodeResponse::Unreachable) | None => Err(ReviveError::network(format!(
                "connection refused: {}",
                address.node_info_url()
            ))),
        }
    }

    async fn cluster_info(&self, address: &NodeAddress) -> ReviveResult<Vec<ClusterMember>> {
        self.state
            .lock()
            .cluster_info
            .get(address)
            .cloned()
            .ok_or_else(|| ReviveError::network(format!("no cluster info at {address}")))
    }

    async fn snapshot_data_blocks(
        &self,
        _address: &NodeAddress,
        ordinal: u64,
    ) -> ReviveResult<usize> {
        Ok(self
            .state
            .lock()
            .data_blocks
            .get(&ordinal)
            .copied()
            .unwrap_or(0))
    }

    async fn global_snapshot_exists(
        &self,
        address: &NodeAddress,
        _hash: &str,
    ) -> ReviveResult<bool> {
        let state = self.state.lock();
        if state.broken_references.contains(&address.ip) {
            return Err(ReviveError::network(format!("{address} did not answer")));
        }
        Ok(state.snapshot_holders.contains(&address.ip))
    }
}

#[async_trait]
impl LedgerEffects for MockEffects {
    async fn latest_cluster_snapshot(
        &self,
        _network: NetworkName,
        cluster_id: &str,
    ) -> ReviveResult<SnapshotInfo> {
        let state = self.state.lock();
        let age = state.cluster_snapshot_age_minutes.ok_or_else(|| {
            ReviveError::network(format!("no snapshot for {cluster_id}"))
        })?;
        Ok(SnapshotInfo {
            timestamp: state.now - Duration::minutes(age),
            ordinal: state.cluster_ordinal,
            hash: format!("cluster-hash-{}", state.cluster_ordinal),
        })
    }

    async fn latest_global_snapshot(
        &self,
        network: NetworkName,
    ) -> ReviveResult<GlobalSnapshotInfo> {
        self.state
            .lock()
            .global_snapshot
            .clone()
            .ok_or_else(|| ReviveError::network(format!("no global snapshot on {network}")))
    }
}

#[async_trait]
impl RemoteCommandEffects for MockEffects {
    async fn dispatch(
        &self,
        targets: &[String],
        commands: &[String],
    ) -> ReviveResult<CommandReceipt> {
        let mut state = self.state.lock();
        if state.fail_dispatch {
            return Err(ReviveError::network("command channel unavailable"));
        }
        let id = format!("cmd-{}", state.dispatched.len() + 1);
        state.dispatched.push(DispatchedCommand {
            id: id.clone(),
            targets: targets.to_vec(),
            commands: commands.to_vec(),
        });
        Ok(CommandReceipt { id })
    }
}

#[async_trait]
impl CredentialEffects for MockEffects {
    async fn secret(&self, path: &str) -> ReviveResult<String> {
        let state = self.state.lock();
        match state.secrets.get(path) {
            Some(value) => Ok(value.clone()),
            None if path.starts_with("/metagraph-nodes/") => Ok(format!("mock:{path}")),
            None => Err(ReviveError::not_found(format!("secret {path} not found"))),
        }
    }
}

#[async_trait]
impl RestartRecordEffects for MockEffects {
    async fn load_record(&self, cluster_id: &str) -> ReviveResult<Option<StoredRestartRecord>> {
        let mut state = self.state.lock();
        let current = state.records.get(cluster_id).cloned();
        if let Some(concurrent) = state.concurrent_write.take() {
            state.records.insert(concurrent.id.clone(), concurrent);
        }
        Ok(current)
    }

    async fn create_record_if_absent(&self, record: &StoredRestartRecord) -> ReviveResult<bool> {
        let mut state = self.state.lock();
        if state.records.contains_key(&record.id) {
            return Ok(false);
        }
        state.records.insert(record.id.clone(), record.clone());
        state.record_writes += 1;
        Ok(true)
    }

    async fn replace_record_if(
        &self,
        expected: &StoredRestartRecord,
        record: &StoredRestartRecord,
    ) -> ReviveResult<bool> {
        let mut state = self.state.lock();
        if state.records.get(&expected.id) != Some(expected) {
            return Ok(false);
        }
        state.records.insert(record.id.clone(), record.clone());
        state.record_writes += 1;
        Ok(true)
    }

    async fn save_record(&self, record: &StoredRestartRecord) -> ReviveResult<()> {
        let mut state = self.state.lock();
        state.records.insert(record.id.clone(), record.clone());
        state.record_writes += 1;
        Ok(())
    }

    async fn delete_record(&self, cluster_id: &str) -> ReviveResult<()> {
        self.state.lock().records.remove(cluster_id);
        Ok(())
    }
}

#[async_trait]
impl AlertEffects for MockEffects {
    async fn create_alert(&self, payload: &AlertPayload) -> ReviveResult<()> {
        self.state.lock().alerts.push(payload.clone());
        Ok(())
    }

    async fn close_alert(&self, alias: &str) -> ReviveResult<()> {
        self.state.lock().closed_alerts.push(alias.to_string());
        Ok(())
    }
}
