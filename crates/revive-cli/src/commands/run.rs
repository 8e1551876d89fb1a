//! `revive run`

use anyhow::Result;
use revive_core::ControllerConfig;

use super::common;

/// Run one invocation and print the response as JSON.
///
/// A fatal error has already been alerted on by the controller; it is
/// returned so the process exits non-zero.
pub async fn run(config: ControllerConfig) -> Result<()> {
    let controller = common::controller(config).await?;
    let response = controller.run().await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
