//! Real time effect handler for production use

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use revive_core::effects::PhysicalTimeEffects;
use std::time::Duration;

/// Wall clock backed by the system time and tokio timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealTimeHandler;

impl RealTimeHandler {
    /// Create a new real time handler
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PhysicalTimeEffects for RealTimeHandler {
    async fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep_ms(&self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}
