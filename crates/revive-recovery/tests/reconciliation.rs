//! Progress reconciliation, mutual exclusion and timeout abandonment.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use assert_matches::assert_matches;
use common::{controller, full_cluster_record, individual_record, insert, stored, REFERENCE_IP};
use revive_core::types::{RestartEpisode, StoredRestartRecord};
use revive_core::{
    Layer, NodeAddress, RestartReason, RestartRecord, RestartState, RestartType, ReviveError,
};
use revive_recovery::{ControllerOutcome, ReconcileOutcome, Reconciler, RecordStore};
use revive_testkit::{
    healthy_cluster, public_port, sample_config, MockEffects, CLUSTER_ID, GENESIS_IP, VALIDATOR_IPS,
};

#[tokio::test]
async fn open_episode_blocks_a_second_one() {
    let config = sample_config();
    let mock = healthy_cluster(&config);
    mock.set_snapshot_age_minutes(30);
    mock.set_node_unreachable(GENESIS_IP, public_port(Layer::L0));
    let before = full_cluster_record(&mock, RestartState::RollbackInProgress, 15);
    let writes = mock.record_writes();

    let response = controller(&mock, config).run().await.expect("run");

    assert_eq!(response.outcome, ControllerOutcome::InProgress);
    assert!(mock.dispatched().is_empty());
    assert!(mock.alerts().is_empty());
    assert_eq!(mock.record_writes(), writes);
    assert_eq!(stored(&mock), Some(before));
}

#[tokio::test]
async fn timed_out_episode_is_abandoned_without_probing() {
    let config = sample_config();
    let mock = healthy_cluster(&config);
    full_cluster_record(&mock, RestartState::RollbackInProgress, 300);

    let response = controller(&mock, config).run().await.expect("run");
    assert_eq!(response.outcome, ControllerOutcome::Abandoned);
    assert!(response.body.contains("abandoned"));

    let fresh = stored(&mock).expect("fresh record");
    assert_eq!(fresh.state, RestartState::New);
    assert_eq!(fresh.restart_type(), RestartType::None);
    assert_eq!(fresh.updated_at, mock.current_time());

    assert_eq!(mock.probe_count(GENESIS_IP, public_port(Layer::L0)), 0);
    assert!(mock.dispatched().is_empty());

    let alerts = mock.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alias, "DAG0fixture_failure_restarted");
    assert!(alerts[0].description.contains("300 minutes"));
}

#[tokio::test]
async fn timeout_applies_to_every_state_and_type() {
    let config = sample_config();
    let target = NodeAddress::new(VALIDATOR_IPS[0], public_port(Layer::CurrencyL1));
    let states = [
        RestartState::RollbackInProgress,
        RestartState::ReadyToJoin,
        RestartState::Joining,
        RestartState::Ready,
    ];

    for state in states {
        for individual in [false, true] {
            let mock = healthy_cluster(&config);
            if individual {
                individual_record(&mock, vec![target.clone()], state, 241);
            } else {
                full_cluster_record(&mock, state, 241);
            }

            let ctx = controller(&mock, config.clone());
            let outcome = Reconciler::new(ctx.context())
                .reconcile(RecordStore::new(ctx.context()).load().await.expect("load"))
                .await
                .expect("reconcile");

            assert_matches!(outcome, ReconcileOutcome::Abandoned { record, .. } => {
                assert_eq!(record.state, state);
            });
            let fresh = stored(&mock).expect("fresh record");
            assert_eq!(fresh.state, RestartState::New);
            assert!(fresh.episode.is_none());
        }
    }
}

#[tokio::test]
async fn genesis_ready_triggers_the_join_phase() {
    let config = sample_config();
    let mock = healthy_cluster(&config);
    let l0 = public_port(Layer::L0);
    for ip in VALIDATOR_IPS {
        mock.set_node_state(ip, l0, "WaitingForDownload");
    }
    full_cluster_record(&mock, RestartState::RollbackInProgress, 20);

    let ctx = controller(&mock, config);
    let outcome = Reconciler::new(ctx.context())
        .reconcile(stored(&mock))
        .await
        .expect("reconcile");

    assert_matches!(outcome, ReconcileOutcome::JoinTriggered(record) => {
        assert_eq!(record.state, RestartState::Joining);
        assert_eq!(record.reference_node_ip(), Some(REFERENCE_IP));
    });
    assert_eq!(stored(&mock).expect("record").state, RestartState::Joining);

    // Validators on every layer, plus genesis as initial validator on both
    // application layers.
    assert_eq!(mock.dispatched_matching("run-validator").len(), 6);
    assert_eq!(mock.dispatched_matching("run-initial-validator").len(), 2);
    assert_eq!(mock.dispatched_matching("/cluster/join").len(), 6);
    assert!(mock.dispatched_matching("run-rollback").is_empty());

    // Validators join L0 before any application layer starts.
    let dispatched = mock.dispatched();
    let last_l0_join = dispatched
        .iter()
        .rposition(|d| d.contains("localhost:7002/cluster/join"))
        .expect("l0 join");
    let first_initial = dispatched
        .iter()
        .position(|d| d.contains("run-initial-validator"))
        .expect("initial validator");
    assert!(last_l0_join < first_initial);
}

#[tokio::test]
async fn stuck_join_phase_keeps_ready_to_join() {
    let config = sample_config();
    let mock = healthy_cluster(&config);
    let l0 = public_port(Layer::L0);
    for ip in VALIDATOR_IPS {
        mock.set_node_unreachable(ip, l0);
    }
    full_cluster_record(&mock, RestartState::RollbackInProgress, 20);

    let err = controller(&mock, config).run().await.unwrap_err();
    assert_matches!(err, ReviveError::Timeout { .. });

    assert_eq!(stored(&mock).expect("record").state, RestartState::ReadyToJoin);
    assert_eq!(mock.alerts().len(), 1);
    assert_eq!(mock.dispatched_matching("/cluster/join").len(), 0);
}

#[tokio::test]
async fn unreachable_target_abandons_individual_episode() {
    let config = sample_config();
    let mock = healthy_cluster(&config);
    let port = public_port(Layer::CurrencyL1);
    let target = NodeAddress::new(VALIDATOR_IPS[0], port);
    mock.set_node_unreachable(VALIDATOR_IPS[0], port);
    individual_record(&mock, vec![target], RestartState::RollbackInProgress, 10);

    let ctx = controller(&mock, config);
    let outcome = Reconciler::new(ctx.context())
        .reconcile(stored(&mock))
        .await
        .expect("reconcile");

    assert_matches!(outcome, ReconcileOutcome::Abandoned { reason, .. } => {
        assert!(reason.contains("10.0.0.2:8000"));
    });
    assert_eq!(stored(&mock).expect("record").state, RestartState::New);
}

#[tokio::test]
async fn booting_target_keeps_individual_episode_waiting() {
    let config = sample_config();
    let mock = healthy_cluster(&config);
    let port = public_port(Layer::CurrencyL1);
    let target = NodeAddress::new(VALIDATOR_IPS[0], port);
    mock.set_node_state(VALIDATOR_IPS[0], port, "SessionStarted");
    let before = individual_record(&mock, vec![target], RestartState::RollbackInProgress, 10);

    let ctx = controller(&mock, config);
    let outcome = Reconciler::new(ctx.context())
        .reconcile(stored(&mock))
        .await
        .expect("reconcile");

    assert_eq!(outcome, ReconcileOutcome::InProgress(before));
}

#[tokio::test]
async fn claim_refuses_when_an_episode_is_open() {
    let config = sample_config();
    let mock = healthy_cluster(&config);
    full_cluster_record(&mock, RestartState::Joining, 1);

    let ctx = controller(&mock, config);
    let claimed = RecordStore::new(ctx.context())
        .claim(RestartEpisode::full_cluster(RestartReason::Forced, REFERENCE_IP))
        .await
        .expect("claim");

    assert!(claimed.is_none());
    assert_eq!(stored(&mock).expect("record").state, RestartState::Joining);
}

#[tokio::test]
async fn claim_replaces_a_stale_new_record() {
    let config = sample_config();
    let mock = healthy_cluster(&config);
    insert(
        &mock,
        &RestartRecord::new(CLUSTER_ID, mock.current_time() - chrono::Duration::minutes(30)),
    );

    let ctx = controller(&mock, config);
    let claimed = RecordStore::new(ctx.context())
        .claim(RestartEpisode::full_cluster(RestartReason::Forced, REFERENCE_IP))
        .await
        .expect("claim")
        .expect("claimed");

    assert_eq!(claimed.reason(), Some(RestartReason::Forced));
    assert_eq!(stored(&mock), Some(claimed));
}

/// A record claimed by another invocation that is still dispatching.
fn concurrent_claim(mock: &MockEffects) -> RestartRecord {
    RestartRecord::claimed(
        CLUSTER_ID,
        RestartEpisode::individual_nodes(
            RestartReason::UnhealthyNodes,
            vec![NodeAddress::new(VALIDATOR_IPS[1], public_port(Layer::DataL1))],
        ),
        mock.current_time(),
    )
}

#[tokio::test]
async fn claim_loses_to_a_write_between_load_and_replace() {
    let config = sample_config();
    for existing in [true, false] {
        let mock = healthy_cluster(&config);
        if existing {
            insert(&mock, &RestartRecord::new(CLUSTER_ID, mock.current_time()));
        }
        let winner = concurrent_claim(&mock);
        mock.write_after_next_load(StoredRestartRecord::from(&winner));

        let ctx = controller(&mock, config.clone());
        let claimed = RecordStore::new(ctx.context())
            .claim(RestartEpisode::full_cluster(RestartReason::Forced, REFERENCE_IP))
            .await
            .expect("claim");

        assert!(claimed.is_none());
        assert_eq!(stored(&mock), Some(winner));
    }
}

#[tokio::test]
async fn claimed_new_record_is_left_to_its_owner() {
    let config = sample_config();
    let mock = healthy_cluster(&config);
    mock.set_snapshot_age_minutes(30);
    let claimed = full_cluster_record(&mock, RestartState::New, 2);
    let writes = mock.record_writes();

    let response = controller(&mock, config).run().await.expect("run");

    assert_eq!(response.outcome, ControllerOutcome::InProgress);
    assert!(mock.dispatched().is_empty());
    assert_eq!(mock.record_writes(), writes);
    assert_eq!(stored(&mock), Some(claimed));
}

#[tokio::test]
async fn abandon_yields_to_a_concurrent_claim() {
    let config = sample_config();
    let mock = healthy_cluster(&config);
    mock.advance_minutes(300);
    full_cluster_record(&mock, RestartState::Joining, 300);
    let winner = concurrent_claim(&mock);
    mock.write_after_next_load(StoredRestartRecord::from(&winner));

    let response = controller(&mock, config).run().await.expect("run");

    assert_eq!(response.outcome, ControllerOutcome::AlreadyClaimed);
    assert_eq!(stored(&mock), Some(winner));
    assert!(mock.alerts().is_empty());
    assert!(mock.dispatched().is_empty());
}

#[tokio::test]
async fn corrupt_record_is_fatal() {
    let config = sample_config();
    let mock = healthy_cluster(&config);
    let mut record = revive_core::types::StoredRestartRecord::from(&full_cluster_record(
        &mock,
        RestartState::Joining,
        1,
    ));
    record.state = "HALFWAY".to_string();
    mock.insert_record(record);

    let err = controller(&mock, config).run().await.unwrap_err();
    assert_matches!(err, ReviveError::CorruptRecord { .. });
    assert!(mock.dispatched().is_empty());
    assert!(mock.stored_record(CLUSTER_ID).is_some());
}
