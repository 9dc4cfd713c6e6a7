//! Test fixtures for querying the monitoring services through the proxy.

pub mod alertmanager;
pub mod prometheus;

pub use alertmanager::AlertmanagerClient;
pub use prometheus::PrometheusClient;

use serde::Deserialize;

/// Outer `{status, data}` wrapper both monitoring services put around
/// query results. `data` is decoded in a second step per query type.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub status: String,
    pub data: serde_json::Value,
}
