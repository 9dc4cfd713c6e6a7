//! Alertmanager client fixture for querying active alerts.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use super::Envelope;
use crate::cluster::{ClusterError, TestCluster};

/// Alertmanager client errors.
#[derive(Debug, Error)]
pub enum AlertmanagerError {
    #[error("Proxied request failed: {0}")]
    Proxy(#[from] ClusterError),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Labels identifying an alert. Absent labels decode as empty strings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertLabels {
    #[serde(default)]
    pub alertname: String,
    #[serde(default)]
    pub container: String,
    #[serde(default)]
    pub namespace: String,
}

/// Alert state as Alertmanager reports it (`active`, `suppressed`, ...).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertStatus {
    #[serde(default)]
    pub state: String,
}

/// One alert from the `api/v1/alerts` listing.
#[derive(Debug, Clone, Deserialize)]
pub struct Alert {
    #[serde(default)]
    pub labels: AlertLabels,
    #[serde(default)]
    pub status: AlertStatus,
    #[serde(default, rename = "startsAt")]
    pub starts_at: Option<DateTime<Utc>>,
}

/// Builder for the `filter` query parameter: comma-separated
/// `label="value"` matchers.
#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    clauses: Vec<(String, String)>,
}

impl AlertFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an exact-match clause. Clauses render in insertion order.
    pub fn label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.clauses.push((name.into(), value.into()));
        self
    }

    pub fn render(&self) -> String {
        let clauses: Vec<String> = self
            .clauses
            .iter()
            .map(|(name, value)| format!("{name}=\"{value}\""))
            .collect();
        clauses.join(",")
    }
}

/// Client for querying Alertmanager through the service proxy, under the
/// path prefix the service is configured to serve.
#[derive(Clone)]
pub struct AlertmanagerClient {
    cluster: TestCluster,
}

impl AlertmanagerClient {
    /// Create a new Alertmanager client.
    pub fn new(cluster: &TestCluster) -> Self {
        Self {
            cluster: cluster.clone(),
        }
    }

    /// List currently active alerts matching `filter`.
    pub async fn active_alerts(
        &self,
        filter: &AlertFilter,
    ) -> Result<Vec<Alert>, AlertmanagerError> {
        let clause = filter.render();
        let body = self
            .cluster
            .proxy_get(
                &self.cluster.config().alertmanager(),
                &self.prefixed("api/v1/alerts"),
                &[("active", "true"), ("filter", clause.as_str())],
            )
            .await?;

        decode(&body)
    }

    /// Readiness probe through the proxy.
    pub async fn ready(&self) -> Result<(), AlertmanagerError> {
        self.cluster
            .proxy_get(
                &self.cluster.config().alertmanager(),
                &self.prefixed("-/ready"),
                &[],
            )
            .await?;

        Ok(())
    }

    fn prefixed(&self, path: &str) -> String {
        format!("{}/{}", self.cluster.config().alertmanager_path, path)
    }
}

/// Two-step decode: envelope first, then the query-specific payload.
fn decode<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, AlertmanagerError> {
    let envelope: Envelope = serde_json::from_str(body)?;

    if envelope.status != "success" {
        return Err(AlertmanagerError::QueryFailed(format!(
            "Query status: {}",
            envelope.status
        )));
    }

    Ok(serde_json::from_value(envelope.data)?)
}
