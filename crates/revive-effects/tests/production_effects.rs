//! Composed production effects against temporary state directories.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_matches::assert_matches;
use chrono::{TimeZone, Utc};
use revive_core::effects::{CredentialEffects, PhysicalTimeEffects, RestartRecordEffects};
use revive_core::types::{RestartEpisode, StoredRestartRecord};
use revive_core::{ControllerConfig, ReviveError, RestartReason, RestartRecord, RestartState};
use revive_effects::ProductionEffects;
use std::path::Path;

fn config_for(state: &Path, alerts_enabled: bool) -> ControllerConfig {
    let toml = format!(
        r#"
        [network]
        name = "testnet"

        [cluster]
        id = "DAG0test"
        name = "Test"

        [cluster.layers.l0]
        public_port = 7000
        p2p_port = 7001
        cli_port = 7002
        directory = "/home/ubuntu/code/metagraph-l0"
        jar = "metagraph-l0.jar"

        [topology.genesis]
        id = "i-genesis"
        ip = "10.0.0.1"

        [[topology.validators]]
        id = "i-v1"
        ip = "10.0.0.2"

        [alerts]
        enabled = {alerts_enabled}

        [storage]
        record_dir = "{records}"
        secret_dir = "{secrets}"
        "#,
        records = state.join("records").display(),
        secrets = state.join("secrets").display(),
    );
    let config = ControllerConfig::from_toml_str(&toml).expect("config parses");
    config.validate().expect("config valid");
    config
}

#[tokio::test]
async fn records_round_trip_through_composed_system() {
    let dir = tempfile::tempdir().expect("tempdir");
    let effects = ProductionEffects::from_config(&config_for(dir.path(), false))
        .await
        .expect("effects");

    let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
    let record = RestartRecord::claimed(
        "DAG0test",
        RestartEpisode::full_cluster(RestartReason::SnapshotsStalled, "52.0.0.1"),
        now,
    );
    let stored = StoredRestartRecord::from(&record);

    assert!(effects.create_record_if_absent(&stored).await.expect("create"));
    assert!(!effects.create_record_if_absent(&stored).await.expect("race"));

    let advanced = record
        .advance(RestartState::RollbackInProgress, now)
        .expect("forward");
    effects
        .save_record(&StoredRestartRecord::from(&advanced))
        .await
        .expect("save");

    let loaded = effects
        .load_record("DAG0test")
        .await
        .expect("load")
        .expect("present");
    let decoded = RestartRecord::try_from(loaded).expect("decodes");
    assert_eq!(decoded, advanced);

    effects.delete_record("DAG0test").await.expect("delete");
    assert!(effects.load_record("DAG0test").await.expect("load").is_none());
}

#[tokio::test]
async fn enabled_alerts_require_api_key() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config_for(dir.path(), true);

    assert_matches!(
        ProductionEffects::from_config(&config).await,
        Err(ReviveError::NotFound { .. })
    );

    let key_dir = dir.path().join("secrets/metagraph-nodes");
    std::fs::create_dir_all(&key_dir).expect("mkdir");
    std::fs::write(key_dir.join("opsgenie-api-key"), "genie\n").expect("write key");

    let effects = ProductionEffects::from_config(&config)
        .await
        .expect("effects with key");
    assert_eq!(
        effects
            .secret("/metagraph-nodes/opsgenie-api-key")
            .await
            .expect("secret"),
        "genie"
    );
}

#[tokio::test]
async fn real_clock_moves_forward() {
    let dir = tempfile::tempdir().expect("tempdir");
    let effects = ProductionEffects::from_config(&config_for(dir.path(), false))
        .await
        .expect("effects");
    let before = effects.now().await;
    effects.sleep_ms(5).await;
    assert!(effects.now().await >= before);
}
