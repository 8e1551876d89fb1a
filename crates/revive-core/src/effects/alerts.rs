//! Alerting sink.

use crate::errors::ReviveResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Alert priority, P1 being the most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertPriority {
    /// Critical
    P1,
    /// High
    P2,
    /// Moderate
    P3,
}

/// Alert body in the shape the paging service expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertPayload {
    /// Short title
    pub message: String,
    /// Multi-line body
    pub description: String,
    /// Stable de-duplication key, also used to close the alert
    pub alias: String,
    /// Suggested actions
    pub actions: Vec<String>,
    /// Tags, including the environment tag
    pub tags: Vec<String>,
    /// Structured key/value details
    pub details: BTreeMap<String, String>,
    /// Affected entity
    pub entity: String,
    /// Priority
    pub priority: AlertPriority,
}

/// Raise and close restart alerts.
#[async_trait]
pub trait AlertEffects: Send + Sync {
    /// Open (or re-open) an alert.
    async fn create_alert(&self, payload: &AlertPayload) -> ReviveResult<()>;

    /// Close the alert with `alias`. Closing an unknown alias succeeds.
    async fn close_alert(&self, alias: &str) -> ReviveResult<()>;
}
