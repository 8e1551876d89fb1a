//! Shared setup for every command.

use anyhow::{Context, Result};
use revive_core::ControllerConfig;
use revive_effects::ProductionEffects;
use revive_recovery::RestartController;
use std::path::Path;
use std::sync::Arc;

/// Load and validate the controller configuration.
pub fn load_config(path: &Path) -> Result<ControllerConfig> {
    let config = ControllerConfig::load_from_file(path)
        .with_context(|| format!("loading config from {}", path.display()))?;
    tracing::debug!(
        path = %path.display(),
        cluster_id = %config.cluster.id,
        "config loaded"
    );
    Ok(config)
}

/// Controller over production effects.
pub async fn controller(config: ControllerConfig) -> Result<RestartController<ProductionEffects>> {
    let effects = ProductionEffects::from_config(&config)
        .await
        .context("building effect handlers")?;
    Ok(RestartController::new(Arc::new(effects), config)?)
}
