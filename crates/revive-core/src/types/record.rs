//! The persisted restart record and its closed enums.
//!
//! `RestartRecord` is the only state that survives between invocations. In
//! memory it is fully typed; on disk it is the flat, all-text
//! `StoredRestartRecord`. Decoding validates every enum value and the
//! consistency between state, restart type and identity fields, and refuses
//! anything it does not recognise with `ReviveError::CorruptRecord`.

use super::node::NodeAddress;
use crate::errors::{ReviveError, ReviveResult};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Progress of a restart episode. Variants are declared in the only order
/// an episode may move through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RestartState {
    /// No episode running (or intent claimed but nothing dispatched yet)
    New,
    /// Processes killed and rollback/restart commands dispatched
    RollbackInProgress,
    /// Genesis is Ready, validators still have to be brought up and joined
    ReadyToJoin,
    /// Join phase dispatched
    Joining,
    /// All targets Ready, pending post-restart validation
    Ready,
}

impl RestartState {
    /// Persisted text form.
    pub fn as_wire(self) -> &'static str {
        match self {
            RestartState::New => "NEW",
            RestartState::RollbackInProgress => "ROLLBACK IN PROGRESS",
            RestartState::ReadyToJoin => "READY TO JOIN",
            RestartState::Joining => "JOINING",
            RestartState::Ready => "READY",
        }
    }

    /// Parse the persisted text form.
    pub fn from_wire(text: &str) -> ReviveResult<Self> {
        match text {
            "NEW" => Ok(RestartState::New),
            "ROLLBACK IN PROGRESS" => Ok(RestartState::RollbackInProgress),
            "READY TO JOIN" => Ok(RestartState::ReadyToJoin),
            "JOINING" => Ok(RestartState::Joining),
            "READY" => Ok(RestartState::Ready),
            other => Err(ReviveError::corrupt_record(format!(
                "unknown restart state '{other}'"
            ))),
        }
    }
}

impl fmt::Display for RestartState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Kind of restart an episode performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RestartType {
    /// Nothing to do
    None,
    /// Kill everything, roll back genesis, rejoin every validator
    FullCluster,
    /// Restart only the unhealthy nodes or layers
    IndividualNodes,
}

impl RestartType {
    /// Persisted text form. `None` persists as the empty string.
    pub fn as_wire(self) -> &'static str {
        match self {
            RestartType::None => "",
            RestartType::FullCluster => "Full Cluster",
            RestartType::IndividualNodes => "Individual Nodes",
        }
    }

    /// Parse the persisted text form.
    pub fn from_wire(text: &str) -> ReviveResult<Self> {
        match text {
            "" => Ok(RestartType::None),
            "Full Cluster" => Ok(RestartType::FullCluster),
            "Individual Nodes" => Ok(RestartType::IndividualNodes),
            other => Err(ReviveError::corrupt_record(format!(
                "unknown restart type '{other}'"
            ))),
        }
    }
}

impl fmt::Display for RestartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestartType::None => f.write_str("Not Restart"),
            other => f.write_str(other.as_wire()),
        }
    }
}

/// Why an episode was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RestartReason {
    /// Operator forced a restart
    Forced,
    /// The cluster stopped producing snapshots
    SnapshotsStalled,
    /// One or more nodes are not Ready
    UnhealthyNodes,
    /// The data layer stopped carrying application blocks
    DataTransactionsStalled,
}

impl RestartReason {
    /// Persisted text form.
    pub fn as_wire(self) -> &'static str {
        match self {
            RestartReason::Forced => "Force metagraph restart provided",
            RestartReason::SnapshotsStalled => "Metagraph stopped producing snapshots",
            RestartReason::UnhealthyNodes => "Nodes are unhealthy",
            RestartReason::DataTransactionsStalled => "Data L1 transactions stopped",
        }
    }

    /// Parse the persisted text form.
    pub fn from_wire(text: &str) -> ReviveResult<Self> {
        [
            RestartReason::Forced,
            RestartReason::SnapshotsStalled,
            RestartReason::UnhealthyNodes,
            RestartReason::DataTransactionsStalled,
        ]
        .into_iter()
        .find(|reason| reason.as_wire() == text)
        .ok_or_else(|| ReviveError::corrupt_record(format!("unknown restart reason '{text}'")))
    }
}

impl fmt::Display for RestartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Who an episode acts on. The variant carries the only identity field that
/// is meaningful for its restart type, so the two can never disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestartTarget {
    /// Full cluster rollback sourced from this reference node
    FullCluster {
        /// IP of the reference source node
        reference_node_ip: String,
    },
    /// Restart of these specific `ip:port` targets
    IndividualNodes {
        /// Targets, in restart order
        targets: Vec<NodeAddress>,
    },
}

impl RestartTarget {
    /// The restart type this target implies.
    pub fn restart_type(&self) -> RestartType {
        match self {
            RestartTarget::FullCluster { .. } => RestartType::FullCluster,
            RestartTarget::IndividualNodes { .. } => RestartType::IndividualNodes,
        }
    }
}

/// Reason and target of an open episode. Fixed for the episode's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartEpisode {
    /// Why the episode was opened
    pub reason: RestartReason,
    /// What it acts on
    pub target: RestartTarget,
}

impl RestartEpisode {
    /// Full cluster episode.
    pub fn full_cluster(reason: RestartReason, reference_node_ip: impl Into<String>) -> Self {
        Self {
            reason,
            target: RestartTarget::FullCluster {
                reference_node_ip: reference_node_ip.into(),
            },
        }
    }

    /// Individual nodes episode.
    pub fn individual_nodes(reason: RestartReason, targets: Vec<NodeAddress>) -> Self {
        Self {
            reason,
            target: RestartTarget::IndividualNodes { targets },
        }
    }
}

/// The single durable unit of cross-invocation state, one per cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartRecord {
    /// Partition key
    pub cluster_id: String,
    /// Episode progress
    pub state: RestartState,
    /// Present once an episode has been claimed
    pub episode: Option<RestartEpisode>,
    /// Time of the last transition
    pub updated_at: DateTime<Utc>,
}

impl RestartRecord {
    /// A fresh record with no episode.
    pub fn new(cluster_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            state: RestartState::New,
            episode: None,
            updated_at: now,
        }
    }

    /// A NEW record carrying the intent of an episode about to be dispatched.
    pub fn claimed(
        cluster_id: impl Into<String>,
        episode: RestartEpisode,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            state: RestartState::New,
            episode: Some(episode),
            updated_at: now,
        }
    }

    /// Restart type of the open episode, `None` when there is none.
    pub fn restart_type(&self) -> RestartType {
        self.episode
            .as_ref()
            .map_or(RestartType::None, |e| e.target.restart_type())
    }

    /// Reason of the open episode.
    pub fn reason(&self) -> Option<RestartReason> {
        self.episode.as_ref().map(|e| e.reason)
    }

    /// Reference source node IP of a full cluster episode.
    pub fn reference_node_ip(&self) -> Option<&str> {
        match self.episode.as_ref().map(|e| &e.target) {
            Some(RestartTarget::FullCluster { reference_node_ip }) => Some(reference_node_ip),
            _ => None,
        }
    }

    /// Targets of an individual nodes episode.
    pub fn individual_targets(&self) -> Option<&[NodeAddress]> {
        match self.episode.as_ref().map(|e| &e.target) {
            Some(RestartTarget::IndividualNodes { targets }) => Some(targets),
            _ => None,
        }
    }

    /// Whether an episode is open. A claimed record is open while still NEW,
    /// before its first actions have been dispatched.
    pub fn is_in_flight(&self) -> bool {
        self.episode.is_some()
    }

    /// Move the record forward to `next`, stamping `now`.
    ///
    /// Only forward moves are accepted, and only for records that carry an
    /// episode. Going back to NEW happens exclusively by replacing the record
    /// with a fresh one.
    pub fn advance(&self, next: RestartState, now: DateTime<Utc>) -> ReviveResult<Self> {
        if self.episode.is_none() {
            return Err(ReviveError::invalid(format!(
                "record for {} has no episode to advance",
                self.cluster_id
            )));
        }
        if next <= self.state {
            return Err(ReviveError::invalid(format!(
                "restart state cannot move from {} to {}",
                self.state, next
            )));
        }
        Ok(Self {
            state: next,
            updated_at: now,
            ..self.clone()
        })
    }

    /// Minutes elapsed since the last transition, floored.
    pub fn minutes_since_update(&self, now: DateTime<Utc>) -> i64 {
        (now - self.updated_at).num_minutes()
    }
}

/// Flat all-text persisted form, one attribute per field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRestartRecord {
    /// Cluster id (partition key)
    pub id: String,
    /// State text
    pub state: String,
    /// Restart type text, empty when none
    #[serde(default)]
    pub restart_type: String,
    /// Restart reason text, empty when none
    #[serde(default)]
    pub restart_reason: String,
    /// Reference node IP, empty unless full cluster
    #[serde(default)]
    pub reference_node_ip: String,
    /// Comma-joined `ip:port` list, empty unless individual nodes
    #[serde(default)]
    pub individual_nodes_ips_with_ports: String,
    /// RFC 3339 timestamp of the last transition
    pub updated_at: String,
}

impl From<&RestartRecord> for StoredRestartRecord {
    fn from(record: &RestartRecord) -> Self {
        let (reference_node_ip, individual) = match record.episode.as_ref().map(|e| &e.target) {
            Some(RestartTarget::FullCluster { reference_node_ip }) => {
                (reference_node_ip.clone(), String::new())
            }
            Some(RestartTarget::IndividualNodes { targets }) => (
                String::new(),
                targets
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            None => (String::new(), String::new()),
        };

        Self {
            id: record.cluster_id.clone(),
            state: record.state.as_wire().to_string(),
            restart_type: record.restart_type().as_wire().to_string(),
            restart_reason: record
                .reason()
                .map(|r| r.as_wire().to_string())
                .unwrap_or_default(),
            reference_node_ip,
            individual_nodes_ips_with_ports: individual,
            updated_at: record
                .updated_at
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

impl TryFrom<StoredRestartRecord> for RestartRecord {
    type Error = ReviveError;

    fn try_from(stored: StoredRestartRecord) -> ReviveResult<Self> {
        if stored.id.is_empty() {
            return Err(ReviveError::corrupt_record("record without cluster id"));
        }

        let state = RestartState::from_wire(&stored.state)?;
        let restart_type = RestartType::from_wire(&stored.restart_type)?;
        let updated_at = DateTime::parse_from_rfc3339(&stored.updated_at)
            .map_err(|e| {
                ReviveError::corrupt_record(format!(
                    "bad updated_at '{}': {e}",
                    stored.updated_at
                ))
            })?
            .with_timezone(&Utc);

        let episode = match restart_type {
            RestartType::None => {
                if state != RestartState::New {
                    return Err(ReviveError::corrupt_record(format!(
                        "state {state} without a restart type"
                    )));
                }
                None
            }
            RestartType::FullCluster => {
                if stored.reference_node_ip.is_empty() {
                    return Err(ReviveError::corrupt_record(
                        "full cluster record without reference node ip",
                    ));
                }
                if !stored.individual_nodes_ips_with_ports.is_empty() {
                    return Err(ReviveError::corrupt_record(
                        "full cluster record carries individual targets",
                    ));
                }
                Some(RestartEpisode::full_cluster(
                    RestartReason::from_wire(&stored.restart_reason)?,
                    stored.reference_node_ip,
                ))
            }
            RestartType::IndividualNodes => {
                if !stored.reference_node_ip.is_empty() {
                    return Err(ReviveError::corrupt_record(
                        "individual nodes record carries a reference node ip",
                    ));
                }
                let targets = stored
                    .individual_nodes_ips_with_ports
                    .split(',')
                    .filter(|s| !s.trim().is_empty())
                    .map(str::parse)
                    .collect::<ReviveResult<Vec<NodeAddress>>>()?;
                if targets.is_empty() {
                    return Err(ReviveError::corrupt_record(
                        "individual nodes record without targets",
                    ));
                }
                Some(RestartEpisode::individual_nodes(
                    RestartReason::from_wire(&stored.restart_reason)?,
                    targets,
                ))
            }
        };

        Ok(Self {
            cluster_id: stored.id,
            state,
            episode,
            updated_at,
        })
    }
}
