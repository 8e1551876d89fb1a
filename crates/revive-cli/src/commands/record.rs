//! `revive status` and `revive clear`: direct access to the restart record.

use anyhow::Result;
use revive_core::types::StoredRestartRecord;
use revive_core::ControllerConfig;
use revive_recovery::RecordStore;

use super::common;

/// Print the stored record in its persisted form.
pub async fn show_status(config: ControllerConfig) -> Result<()> {
    let controller = common::controller(config).await?;
    let store = RecordStore::new(controller.context());

    match store.load().await? {
        Some(record) => {
            let stored = StoredRestartRecord::from(&record);
            println!("{}", serde_json::to_string_pretty(&stored)?);
        }
        None => println!("no episode open for {}", controller.context().cluster_id()),
    }
    Ok(())
}

/// Remove the stored record so the next run starts from scratch.
pub async fn clear(config: ControllerConfig) -> Result<()> {
    let controller = common::controller(config).await?;
    let cluster_id = controller.context().cluster_id().to_string();
    RecordStore::new(controller.context()).delete().await?;
    tracing::warn!(%cluster_id, "restart record cleared by operator");
    println!("restart record cleared for {cluster_id}");
    Ok(())
}
