//! Prometheus client fixture for series and discovery queries.

use serde::Deserialize;
use thiserror::Error;

use super::Envelope;
use crate::cluster::{ClusterError, TestCluster};

/// Prometheus client errors.
#[derive(Debug, Error)]
pub enum PrometheusError {
    #[error("Proxied request failed: {0}")]
    Proxy(#[from] ClusterError),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// One row of an `api/v1/series` result: the label set of a matching
/// series. Labels the series does not carry decode as empty strings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Series {
    #[serde(default)]
    pub alertname: String,
    #[serde(default)]
    pub container: String,
    #[serde(default)]
    pub namespace: String,
}

/// One discovered alert-routing instance.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Endpoint {
    #[serde(default)]
    pub url: String,
}

/// Result of `api/v1/alertmanagers`: the Alertmanager endpoints
/// Prometheus is currently shipping alerts to.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertmanagerDiscovery {
    #[serde(default, rename = "activeAlertmanagers")]
    pub active: Vec<Endpoint>,
    #[serde(default, rename = "droppedAlertmanagers")]
    pub dropped: Vec<Endpoint>,
}

/// Builder for a series match expression such as
/// `kube_pod_container_info{namespace="x",container="y"}`.
#[derive(Debug, Clone)]
pub struct SeriesSelector {
    metric: String,
    labels: Vec<(String, String)>,
}

impl SeriesSelector {
    pub fn metric(name: impl Into<String>) -> Self {
        Self {
            metric: name.into(),
            labels: Vec::new(),
        }
    }

    /// Add an exact-match label clause. Clauses render in insertion order.
    pub fn label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((name.into(), value.into()));
        self
    }

    pub fn render(&self) -> String {
        if self.labels.is_empty() {
            return self.metric.clone();
        }

        let clauses: Vec<String> = self
            .labels
            .iter()
            .map(|(name, value)| format!("{name}=\"{value}\""))
            .collect();
        format!("{}{{{}}}", self.metric, clauses.join(","))
    }
}

/// Client for querying Prometheus through the service proxy.
#[derive(Clone)]
pub struct PrometheusClient {
    cluster: TestCluster,
}

impl PrometheusClient {
    /// Create a new Prometheus client.
    pub fn new(cluster: &TestCluster) -> Self {
        Self {
            cluster: cluster.clone(),
        }
    }

    /// List the series matching `selector`.
    pub async fn series(&self, selector: &SeriesSelector) -> Result<Vec<Series>, PrometheusError> {
        let expr = selector.render();
        let body = self
            .cluster
            .proxy_get(
                &self.cluster.config().prometheus(),
                "api/v1/series",
                &[("match[]", expr.as_str())],
            )
            .await?;

        decode(&body)
    }

    /// Which alert-routing endpoints Prometheus has discovered.
    pub async fn alertmanagers(&self) -> Result<AlertmanagerDiscovery, PrometheusError> {
        let body = self
            .cluster
            .proxy_get(
                &self.cluster.config().prometheus(),
                "api/v1/alertmanagers",
                &[],
            )
            .await?;

        decode(&body)
    }

    /// Readiness probe through the proxy.
    pub async fn ready(&self) -> Result<(), PrometheusError> {
        self.cluster
            .proxy_get(&self.cluster.config().prometheus(), "-/ready", &[])
            .await?;

        Ok(())
    }
}

/// Two-step decode: envelope first, then the query-specific payload.
fn decode<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, PrometheusError> {
    let envelope: Envelope = serde_json::from_str(body)?;

    if envelope.status != "success" {
        return Err(PrometheusError::QueryFailed(format!(
            "Query status: {}",
            envelope.status
        )));
    }

    Ok(serde_json::from_value(envelope.data)?)
}
