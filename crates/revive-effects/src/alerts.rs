//! Alert sinks: Opsgenie over HTTP, and a log-only sink.

use async_trait::async_trait;
use revive_core::effects::{AlertEffects, AlertPayload};
use revive_core::{ReviveError, ReviveResult};
use serde_json::json;
use std::time::Duration;

use crate::http::network_error;

const CLOSE_USER: &str = "Monitoring Script";
const CLOSE_SOURCE: &str = "revive";
const CLOSE_NOTE: &str = "Action executed via Alert API";

/// Creates and closes alerts through the Opsgenie alert API.
#[derive(Clone)]
pub struct OpsgenieAlertHandler {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl std::fmt::Debug for OpsgenieAlertHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpsgenieAlertHandler")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl OpsgenieAlertHandler {
    /// Create a handler posting to `api_url` with `api_key`.
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> ReviveResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ReviveError::internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// URL closing the alert identified by `alias`.
    pub fn close_url(&self, alias: &str) -> String {
        format!("{}/{alias}/close?identifierType=alias", self.api_url)
    }

    async fn post(&self, url: &str, body: &serde_json::Value) -> ReviveResult<reqwest::StatusCode> {
        let response = self
            .client
            .post(url)
            .header("Authorization", format!("GenieKey {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| network_error(url, e))?;
        Ok(response.status())
    }
}

#[async_trait]
impl AlertEffects for OpsgenieAlertHandler {
    async fn create_alert(&self, payload: &AlertPayload) -> ReviveResult<()> {
        let body = serde_json::to_value(payload)?;
        let status = self.post(&self.api_url, &body).await?;
        if !status.is_success() {
            return Err(ReviveError::network(format!(
                "alert {} rejected with {status}",
                payload.alias
            )));
        }
        tracing::info!(alias = %payload.alias, priority = ?payload.priority, "alert created");
        Ok(())
    }

    async fn close_alert(&self, alias: &str) -> ReviveResult<()> {
        let url = self.close_url(alias);
        let body = json!({ "user": CLOSE_USER, "source": CLOSE_SOURCE, "note": CLOSE_NOTE });
        let status = self.post(&url, &body).await?;
        if status == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(%alias, "no open alert to close");
            return Ok(());
        }
        if !status.is_success() {
            return Err(ReviveError::network(format!(
                "closing alert {alias} rejected with {status}"
            )));
        }
        tracing::info!(%alias, "alert closed");
        Ok(())
    }
}

/// Alert sink used when paging is disabled. Alerts are only logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingAlertHandler;

#[async_trait]
impl AlertEffects for LoggingAlertHandler {
    async fn create_alert(&self, payload: &AlertPayload) -> ReviveResult<()> {
        tracing::info!(
            alias = %payload.alias,
            priority = ?payload.priority,
            message = %payload.message,
            "alerts disabled, not paging"
        );
        Ok(())
    }

    async fn close_alert(&self, alias: &str) -> ReviveResult<()> {
        tracing::debug!(%alias, "alerts disabled, nothing to close");
        Ok(())
    }
}
