//! Readiness polling across a whole layer.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use assert_matches::assert_matches;
use common::controller;
use revive_core::{Layer, ReviveError};
use revive_recovery::HealthProber;
use revive_testkit::{
    healthy_cluster, public_port, sample_config, NodeResponse, GENESIS_IP, VALIDATOR_IPS,
};

#[tokio::test]
async fn ready_nodes_are_not_probed_again() {
    let config = sample_config();
    let mock = healthy_cluster(&config);
    let l0 = public_port(Layer::L0);
    mock.script_node(
        VALIDATOR_IPS[1],
        l0,
        vec![NodeResponse::starting(), NodeResponse::starting(), NodeResponse::ready()],
    );

    let ctx = controller(&mock, config);
    HealthProber::new(ctx.context())
        .await_all_ready(Layer::L0)
        .await
        .expect("all ready");

    assert_eq!(mock.probe_count(GENESIS_IP, l0), 1);
    assert_eq!(mock.probe_count(VALIDATOR_IPS[0], l0), 1);
    assert_eq!(mock.probe_count(VALIDATOR_IPS[1], l0), 3);
    assert_eq!(mock.slept_ms(), 20_000);
}

#[tokio::test]
async fn laggard_exhausts_the_budget_alone() {
    let config = sample_config();
    let mock = healthy_cluster(&config);
    let cl1 = public_port(Layer::CurrencyL1);
    mock.set_node_state(VALIDATOR_IPS[0], cl1, "Observing");

    let ctx = controller(&mock, config);
    let err = HealthProber::new(ctx.context())
        .await_all_ready(Layer::CurrencyL1)
        .await
        .unwrap_err();

    assert_matches!(err, ReviveError::Timeout { .. });
    assert!(err.message().contains("10.0.0.2:8000"));
    assert_eq!(mock.probe_count(VALIDATOR_IPS[0], cl1), 5);
    assert_eq!(mock.probe_count(GENESIS_IP, cl1), 1);
    assert_eq!(mock.probe_count(VALIDATOR_IPS[1], cl1), 1);
}
