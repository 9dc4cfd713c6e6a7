//! Smoke Tests: Cluster and Monitoring Stack Health
//!
//! These tests validate that the cluster is reachable and that the
//! monitoring stack answers through the API server's service proxy. The
//! scenario tests depend on all of these passing.

#![cfg(feature = "smoke")]

use std::time::Duration;

use monitoring_tests::cluster::TestCluster;
use monitoring_tests::eventual::{wait_until, PollBudget};
use monitoring_tests::fixtures::{AlertmanagerClient, PrometheusClient};
use monitoring_tests::scenario::NAMESPACE_PREFIX;

/// Helper to create a cluster connection for tests.
async fn cluster() -> TestCluster {
    monitoring_tests::init_test_logging();
    TestCluster::connect()
        .await
        .expect("Failed to connect to cluster - ensure a kubeconfig is available")
}

/// Readiness probes get a short budget; the monitoring stack is expected
/// to already be up.
fn readiness_budget() -> PollBudget {
    PollBudget::new(Duration::from_secs(5), Duration::from_secs(60))
}

#[tokio::test]
async fn test_apiserver_reachable() {
    let cluster = cluster().await;

    let version = cluster
        .apiserver_version()
        .await
        .expect("API server version request should succeed");

    eprintln!("API server version: {}", version.git_version);
}

#[tokio::test]
async fn test_prometheus_ready_via_proxy() {
    let cluster = cluster().await;
    let prometheus = PrometheusClient::new(&cluster);

    wait_until(readiness_budget(), || {
        let prometheus = prometheus.clone();
        async move { prometheus.ready().await.is_ok() }
    })
    .await
    .expect("Prometheus should answer its readiness probe through the proxy");
}

#[tokio::test]
async fn test_alertmanager_ready_via_proxy() {
    let cluster = cluster().await;
    let alertmanager = AlertmanagerClient::new(&cluster);

    wait_until(readiness_budget(), || {
        let alertmanager = alertmanager.clone();
        async move { alertmanager.ready().await.is_ok() }
    })
    .await
    .expect("Alertmanager should answer its readiness probe through the proxy");
}

#[tokio::test]
async fn test_namespace_create_delete_roundtrip() {
    let cluster = cluster().await;

    let namespace = cluster
        .create_test_namespace(NAMESPACE_PREFIX)
        .await
        .expect("Namespace creation should succeed");
    assert!(
        namespace.starts_with(NAMESPACE_PREFIX),
        "Generated namespace {} should carry the scenario prefix",
        namespace
    );

    cluster
        .delete_namespace(&namespace)
        .await
        .expect("Namespace deletion should succeed");

    wait_until(readiness_budget(), || {
        let cluster = cluster.clone();
        let namespace = namespace.clone();
        async move { cluster.namespace_is_gone(&namespace).await.unwrap_or(false) }
    })
    .await
    .expect("Deleted namespace should be gone or terminating");
}
