//! Shared helpers for restart scenario tests.

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use chrono::Duration;
use revive_core::types::{RestartEpisode, StoredRestartRecord};
use revive_core::{ControllerConfig, NodeAddress, RestartReason, RestartRecord, RestartState};
use revive_recovery::RestartController;
use revive_testkit::{init_test_tracing, MockEffects, CLUSTER_ID};
use std::sync::Arc;

/// First built-in integrationnet reference node, the one fixtures mark as
/// holding the latest global snapshot.
pub const REFERENCE_IP: &str = "3.101.147.116";

/// Controller over a clone of `mock`.
pub fn controller(mock: &MockEffects, config: ControllerConfig) -> RestartController<MockEffects> {
    init_test_tracing();
    RestartController::new(Arc::new(mock.clone()), config).expect("valid config")
}

/// The stored record, decoded.
pub fn stored(mock: &MockEffects) -> Option<RestartRecord> {
    mock.stored_record(CLUSTER_ID)
        .map(|record| RestartRecord::try_from(record).expect("decodable record"))
}

/// Put `record` in the store.
pub fn insert(mock: &MockEffects, record: &RestartRecord) {
    mock.insert_record(StoredRestartRecord::from(record));
}

fn at_state(
    mock: &MockEffects,
    episode: RestartEpisode,
    state: RestartState,
    minutes_ago: i64,
) -> RestartRecord {
    let at = mock.current_time() - Duration::minutes(minutes_ago);
    let record = RestartRecord::claimed(CLUSTER_ID, episode, at);
    if state == RestartState::New {
        return record;
    }
    record.advance(state, at).expect("forward move")
}

/// A stored full cluster record in `state`, last updated `minutes_ago`.
pub fn full_cluster_record(mock: &MockEffects, state: RestartState, minutes_ago: i64) -> RestartRecord {
    let record = at_state(
        mock,
        RestartEpisode::full_cluster(RestartReason::SnapshotsStalled, REFERENCE_IP),
        state,
        minutes_ago,
    );
    insert(mock, &record);
    record
}

/// A stored individual nodes record in `state`, last updated `minutes_ago`.
pub fn individual_record(
    mock: &MockEffects,
    targets: Vec<NodeAddress>,
    state: RestartState,
    minutes_ago: i64,
) -> RestartRecord {
    let record = at_state(
        mock,
        RestartEpisode::individual_nodes(RestartReason::UnhealthyNodes, targets),
        state,
        minutes_ago,
    );
    insert(mock, &record);
    record
}
