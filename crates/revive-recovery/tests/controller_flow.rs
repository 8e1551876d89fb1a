//! End-to-end invocations of the restart controller against mock effects.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use assert_matches::assert_matches;
use common::{controller, full_cluster_record, stored, REFERENCE_IP};
use revive_core::effects::AlertPriority;
use revive_core::{Layer, NodeAddress, RestartReason, RestartState, RestartType, ReviveError};
use revive_recovery::ControllerOutcome;
use revive_testkit::{
    healthy_cluster, layer_healthy, public_port, sample_config, MockEffects, NodeResponse,
    CLUSTER_ID, GENESIS_IP, GLOBAL_HASH, VALIDATOR_IPS,
};

#[tokio::test]
async fn healthy_cluster_is_left_alone_and_never_persisted() {
    let config = sample_config();
    let mock = healthy_cluster(&config);

    for _ in 0..2 {
        let response = controller(&mock, config.clone()).run().await.expect("run");
        assert_eq!(response.status_code, 200);
        assert_eq!(response.outcome, ControllerOutcome::Healthy);
    }

    assert!(mock.stored_record(CLUSTER_ID).is_none());
    assert_eq!(mock.record_writes(), 0);
    assert!(mock.dispatched().is_empty());
    assert!(mock.alerts().is_empty());
}

#[tokio::test]
async fn stalled_snapshots_start_a_full_rollback() {
    let config = sample_config();
    let mock = healthy_cluster(&config);
    mock.set_snapshot_age_minutes(10);

    let response = controller(&mock, config).run().await.expect("run");
    assert_eq!(
        response.outcome,
        ControllerOutcome::RestartStarted(RestartType::FullCluster)
    );

    let record = stored(&mock).expect("record");
    assert_eq!(record.state, RestartState::RollbackInProgress);
    assert_eq!(record.reason(), Some(RestartReason::SnapshotsStalled));
    assert_eq!(record.reference_node_ip(), Some(REFERENCE_IP));

    let stops = mock.dispatched_matching("fuser -k 7000/tcp");
    assert_eq!(stops.len(), 1);
    assert_eq!(stops[0].targets.len(), 3);
    assert!(stops[0].contains("fuser -k 9000/tcp"));

    let backups = mock.dispatched_matching("incremental_snapshot_bkp_");
    assert_eq!(backups.len(), 1);
    assert_eq!(backups[0].targets, vec!["i-genesis".to_string()]);
    assert!(backups[0].contains("seq 1000 1001"));

    let rollback = mock.dispatched_matching("run-rollback");
    assert_eq!(rollback.len(), 1);
    assert_eq!(rollback[0].targets, vec!["i-genesis".to_string()]);
    assert!(rollback[0].contains(&format!("CL_GLOBAL_L0_PEER_HTTP_HOST='{REFERENCE_IP}'")));

    let alerts = mock.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alias, "DAG0fixture_restart");
    assert_eq!(alerts[0].priority, AlertPriority::P3);
}

#[tokio::test]
async fn missing_reference_node_aborts_before_any_action() {
    let config = sample_config();
    let mock = MockEffects::new();
    for layer in config.enabled_layers() {
        layer_healthy(&mock, &config, layer);
    }
    mock.set_snapshot_age_minutes(30);
    mock.set_global_snapshot(500, GLOBAL_HASH);

    let err = controller(&mock, config).run().await.unwrap_err();
    assert_matches!(err, ReviveError::NotFound { .. });

    assert!(mock.stored_record(CLUSTER_ID).is_none());
    assert!(mock.dispatched().is_empty());
    let alerts = mock.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alias, "DAG0fixture_failure_restarted");
    assert_eq!(alerts[0].priority, AlertPriority::P1);
}

#[tokio::test]
async fn unreachable_ledger_is_fatal() {
    let config = sample_config();
    let mock = healthy_cluster(&config);
    mock.clear_cluster_snapshot();

    let err = controller(&mock, config).run().await.unwrap_err();
    assert_matches!(err, ReviveError::Network { .. });
    assert!(mock.stored_record(CLUSTER_ID).is_none());
    assert_eq!(mock.alerts().len(), 1);
}

#[tokio::test]
async fn forced_restart_reconciles_on_the_next_run() {
    let mut config = sample_config();
    config.cluster.force_restart = true;
    let mock = healthy_cluster(&config);

    let response = controller(&mock, config.clone()).run().await.expect("first run");
    assert_eq!(
        response.outcome,
        ControllerOutcome::RestartStarted(RestartType::FullCluster)
    );
    let started = stored(&mock).expect("record");
    assert_eq!(started.reason(), Some(RestartReason::Forced));
    assert_eq!(started.state, RestartState::RollbackInProgress);

    // Genesis came back, validators still waiting.
    let l0 = public_port(Layer::L0);
    for ip in VALIDATOR_IPS {
        mock.set_node_state(ip, l0, "WaitingForDownload");
    }
    let response = controller(&mock, config).run().await.expect("second run");

    assert_eq!(response.outcome, ControllerOutcome::JoinTriggered);
    assert_eq!(stored(&mock).expect("record").state, RestartState::Joining);
    assert_eq!(mock.dispatched_matching("run-rollback").len(), 1);
    assert_eq!(mock.dispatched_matching("fuser -k 7000/tcp").len(), 1);
}

#[tokio::test]
async fn forced_restart_leaves_an_open_episode_alone() {
    let mut config = sample_config();
    config.cluster.force_restart = true;
    let mock = healthy_cluster(&config);
    let stuck = NodeAddress::new(VALIDATOR_IPS[0], public_port(Layer::DataL1));
    mock.set_node_state(&stuck.ip, stuck.port, "SessionStarted");
    let open = common::individual_record(&mock, vec![stuck], RestartState::RollbackInProgress, 5);

    let response = controller(&mock, config).run().await.expect("run");

    assert_eq!(response.outcome, ControllerOutcome::InProgress);
    assert_eq!(stored(&mock), Some(open));
    assert!(mock.dispatched().is_empty());
}

#[tokio::test]
async fn failed_dispatch_does_not_stop_the_rollback() {
    let config = sample_config();
    let mock = healthy_cluster(&config);
    mock.set_snapshot_age_minutes(10);
    mock.fail_dispatch(true);

    let response = controller(&mock, config).run().await.expect("run");

    assert_eq!(
        response.outcome,
        ControllerOutcome::RestartStarted(RestartType::FullCluster)
    );
    assert_eq!(stored(&mock).expect("record").state, RestartState::RollbackInProgress);
    assert!(mock.dispatched().is_empty());
    assert_eq!(mock.alerts().len(), 1);
    assert_eq!(mock.alerts()[0].alias, "DAG0fixture_restart");
}

#[tokio::test]
async fn reference_nodes_are_tried_in_priority_order() {
    let config = sample_config();
    let mock = healthy_cluster(&config);
    mock.set_snapshot_age_minutes(10);
    // First choice errors, second answers but lacks the snapshot.
    mock.break_reference_node(REFERENCE_IP);
    mock.add_snapshot_holder("54.67.6.165");

    controller(&mock, config.clone()).run().await.expect("run");
    let record = stored(&mock).expect("record");
    assert_eq!(record.reference_node_ip(), Some("54.67.6.165"));

    // Once the second holds it too, it wins over the third.
    let mock = healthy_cluster(&config);
    mock.set_snapshot_age_minutes(10);
    mock.break_reference_node(REFERENCE_IP);
    mock.add_snapshot_holder("52.53.216.201");
    mock.add_snapshot_holder("54.67.6.165");

    controller(&mock, config).run().await.expect("run");
    let record = stored(&mock).expect("record");
    assert_eq!(record.reference_node_ip(), Some("52.53.216.201"));
    let rollback = mock.dispatched_matching("run-rollback");
    assert!(rollback[0].contains("CL_GLOBAL_L0_PEER_HTTP_HOST='52.53.216.201'"));
}

#[tokio::test]
async fn rollback_uses_ledger_ordinal_and_stored_keys() {
    let config = sample_config();
    let mock = healthy_cluster(&config);
    mock.set_snapshot_age_minutes(10);
    mock.set_cluster_ordinal(2_000);
    mock.set_secret("/metagraph-nodes/i-genesis/l0/keystore", "genesis-l0.p12");

    controller(&mock, config).run().await.expect("run");

    let backups = mock.dispatched_matching("incremental_snapshot_bkp_");
    assert!(backups[0].contains("seq 2000 2001"));
    let rollback = mock.dispatched_matching("run-rollback");
    assert!(rollback[0].contains("export CL_KEYSTORE='genesis-l0.p12'"));
    assert!(rollback[0].contains("export CL_KEYALIAS='mock:/metagraph-nodes/i-genesis/l0/keyalias'"));
}

#[tokio::test]
async fn failed_start_releases_the_claim() {
    let config = sample_config();
    let mock = healthy_cluster(&config);
    let port = public_port(Layer::DataL1);
    mock.set_node_unreachable(VALIDATOR_IPS[1], port);

    let err = controller(&mock, config.clone()).run().await.unwrap_err();
    assert_matches!(err, ReviveError::Timeout { .. });

    let record = stored(&mock).expect("record");
    assert_eq!(record.state, RestartState::New);
    assert!(!record.is_in_flight());
    let alerts = mock.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alias, "DAG0fixture_failure_restarted");

    // The next run may claim again right away.
    mock.set_node_ready(VALIDATOR_IPS[1], port);
    let response = controller(&mock, config).run().await.expect("run");
    assert_eq!(response.outcome, ControllerOutcome::Healthy);
}

#[tokio::test]
async fn single_unhealthy_node_is_restarted_alone() {
    let config = sample_config();
    let mock = healthy_cluster(&config);
    let port = public_port(Layer::DataL1);
    mock.script_node(
        VALIDATOR_IPS[1],
        port,
        vec![
            NodeResponse::Unreachable,
            NodeResponse::Unreachable,
            NodeResponse::Unreachable,
            NodeResponse::starting(),
        ],
    );

    let response = controller(&mock, config.clone()).run().await.expect("run");
    assert_eq!(
        response.outcome,
        ControllerOutcome::RestartStarted(RestartType::IndividualNodes)
    );

    let record = stored(&mock).expect("record");
    assert_eq!(record.state, RestartState::RollbackInProgress);
    assert_eq!(
        record.individual_targets(),
        Some(&[NodeAddress::new(VALIDATOR_IPS[1], port)][..])
    );

    assert!(mock.dispatched_matching("fuser -k 7000/tcp").is_empty());
    let stops = mock.dispatched_matching(&format!("fuser -k {port}/tcp"));
    assert_eq!(stops.len(), 1);
    assert_eq!(stops[0].targets, vec!["i-v2".to_string()]);

    let starts = mock.dispatched_matching("run-validator");
    assert_eq!(starts.len(), 1);
    assert!(starts[0].contains(&format!("CL_L0_PEER_HTTP_HOST='{GENESIS_IP}'")));

    let joins = mock.dispatched_matching("/cluster/join");
    assert_eq!(joins.len(), 1);
    assert!(joins[0].contains(&format!(r#""ip":"{GENESIS_IP}""#)));

    // Next invocation: the node came back.
    mock.set_node_ready(VALIDATOR_IPS[1], port);
    let response = controller(&mock, config).run().await.expect("run");
    assert_eq!(response.outcome, ControllerOutcome::HealthyAfterRestart);
    assert!(mock.stored_record(CLUSTER_ID).is_none());
    assert_eq!(mock.closed_alerts(), vec!["DAG0fixture_restart".to_string()]);
}

#[tokio::test]
async fn stalled_data_transactions_restart_the_data_layer() {
    let mut config = sample_config();
    config.cluster.monitor_data_l1_transactions = true;
    let mock = healthy_cluster(&config);
    mock.set_data_blocks(1_000, 0);

    let response = controller(&mock, config).run().await.expect("run");
    assert_eq!(
        response.outcome,
        ControllerOutcome::RestartStarted(RestartType::IndividualNodes)
    );

    let record = stored(&mock).expect("record");
    assert_eq!(record.reason(), Some(RestartReason::DataTransactionsStalled));
    assert_eq!(record.individual_targets().map(<[_]>::len), Some(3));

    let initial = mock.dispatched_matching("run-initial-validator");
    assert_eq!(initial.len(), 1);
    assert_eq!(initial[0].targets, vec!["i-genesis".to_string()]);
    assert!(initial[0].contains("'dl1.jar'"));
    assert_eq!(mock.dispatched_matching("run-validator").len(), 2);
    assert!(mock.dispatched_matching("run-rollback").is_empty());
}

#[tokio::test]
async fn full_episode_moves_forward_only() {
    let config = sample_config();
    let mock = healthy_cluster(&config);
    let l0 = public_port(Layer::L0);
    mock.set_snapshot_age_minutes(10);

    let mut states = Vec::new();

    let response = controller(&mock, config.clone()).run().await.expect("rollback");
    assert_eq!(
        response.outcome,
        ControllerOutcome::RestartStarted(RestartType::FullCluster)
    );
    states.push(stored(&mock).expect("record").state);

    // Genesis is back, validators are booting.
    for ip in VALIDATOR_IPS {
        mock.set_node_state(ip, l0, "WaitingForDownload");
    }
    mock.set_snapshot_age_minutes(1);
    let response = controller(&mock, config.clone()).run().await.expect("join");
    assert_eq!(response.outcome, ControllerOutcome::JoinTriggered);
    states.push(stored(&mock).expect("record").state);

    // Still joining: nothing new is dispatched.
    mock.clear_history();
    let response = controller(&mock, config.clone()).run().await.expect("waiting");
    assert_eq!(response.outcome, ControllerOutcome::InProgress);
    assert!(mock.dispatched().is_empty());
    states.push(stored(&mock).expect("record").state);

    for ip in VALIDATOR_IPS {
        mock.set_node_ready(ip, l0);
    }
    let response = controller(&mock, config).run().await.expect("validate");
    assert_eq!(response.outcome, ControllerOutcome::HealthyAfterRestart);
    assert!(mock.stored_record(CLUSTER_ID).is_none());

    assert_eq!(
        states,
        vec![
            RestartState::RollbackInProgress,
            RestartState::Joining,
            RestartState::Joining,
        ]
    );
    assert!(states.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[tokio::test]
async fn failed_validation_closes_the_episode_with_an_alert() {
    let config = sample_config();
    let mock = healthy_cluster(&config);
    mock.set_snapshot_age_minutes(20);
    full_cluster_record(&mock, RestartState::Ready, 10);

    let err = controller(&mock, config).run().await.unwrap_err();
    assert_matches!(err, ReviveError::Timeout { .. });

    assert!(mock.stored_record(CLUSTER_ID).is_none());
    let alerts = mock.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].priority, AlertPriority::P1);
    assert!(alerts[0].description.contains("Restart state: READY"));
    assert!(mock.closed_alerts().is_empty());
}

#[tokio::test]
async fn response_serializes_for_callers() {
    let config = sample_config();
    let mock = healthy_cluster(&config);

    let response = controller(&mock, config).run().await.expect("run");
    let json = serde_json::to_value(&response).expect("json");
    assert_eq!(json["statusCode"], 200);
    assert!(json["body"].as_str().is_some_and(|body| body.contains("healthy")));
}
