//! Monitoring Environment Test Suite
//!
//! This crate provides end-to-end tests for a cluster's monitoring stack.
//! Each scenario deploys a workload into an isolated namespace, then polls
//! Prometheus or Alertmanager through the API server's service proxy until
//! the workload (or its crash-loop alert) becomes visible.
//!
//! # Features
//!
//! - `smoke`: Cluster and monitoring stack reachability checks
//! - `monitoring`: Healthy-workload scenarios (series visibility, Alertmanager discovery)
//! - `alerting`: Crash-loop scenarios (slow: waits for the alert rule to fire)
//! - `all`: Enable all test categories
//!
//! # Prerequisites
//!
//! 1. A reachable cluster (kubeconfig or in-cluster service account) with
//!    permission to create namespaces and deployments and to proxy services
//! 2. Prometheus and Alertmanager deployed in the monitoring namespace
//!    (default `kubeprod`; override via `MONITORING_*` variables)
//! 3. A crash-loop alerting rule matching `MONITORING_CRASHLOOP_ALERTNAME`
//!    (default `CrashLooping_test`) configured in Prometheus
//!
//! # Usage
//!
//! ```bash
//! # Unit tests only (no cluster required, no default features)
//! cargo test
//!
//! # Reachability checks (fast)
//! cargo test -p monitoring-tests --features smoke
//!
//! # Healthy-workload scenarios
//! cargo test -p monitoring-tests --features monitoring
//!
//! # Full suite, including the slow crash-loop scenarios
//! cargo test -p monitoring-tests --features all
//! ```

use std::sync::Once;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod cluster;
pub mod config;
pub mod eventual;
pub mod fixtures;
pub mod scenario;
pub mod workload;

static LOG_INIT: Once = Once::new();

/// Initialize tracing for a test binary.
///
/// Safe to call from every test; only the first call installs the
/// subscriber. The filter honors `RUST_LOG` and defaults to info-level
/// output from this crate.
pub fn init_test_logging() {
    LOG_INIT.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "monitoring_tests=info".into()),
            )
            .with(tracing_subscriber::fmt::layer())
            .try_init();
    });
}
