//! Scenario lifecycle: namespace setup, workload deploy, teardown.
//!
//! Every cluster-facing test runs the same shape: create an isolated
//! namespace, deploy the workload fixture into it, poll a monitoring query
//! until its condition holds, then delete the namespace. `Scenario` owns
//! the setup and teardown halves so tests only differ in what they poll.

use thiserror::Error;
use tracing::warn;

use crate::cluster::{ClusterError, TestCluster};
use crate::workload::{Workload, WorkloadError};

/// Prefix for scenario namespaces, making leftovers easy to spot.
pub const NAMESPACE_PREFIX: &str = "test-monitoring-";

/// Scenario lifecycle errors.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Cluster operation failed: {0}")]
    Cluster(#[from] ClusterError),

    #[error("Workload operation failed: {0}")]
    Workload(#[from] WorkloadError),
}

/// A deployed scenario: one namespace, one workload.
pub struct Scenario {
    cluster: TestCluster,
    namespace: String,
    workload: Workload,
}

impl Scenario {
    /// Connect to the cluster, create a fresh `test-monitoring-*`
    /// namespace, and deploy `workload` into it.
    ///
    /// Any failure here is fatal to the scenario. A deploy failure still
    /// deletes the namespace created just before it, so an aborted setup
    /// leaves nothing behind in the cluster.
    pub async fn deploy(workload: Workload) -> Result<Self, ScenarioError> {
        let cluster = TestCluster::connect().await?;
        let namespace = cluster.create_test_namespace(NAMESPACE_PREFIX).await?;

        if let Err(err) = workload.deploy(&cluster, &namespace).await {
            if let Err(cleanup) = cluster.delete_namespace(&namespace).await {
                warn!(
                    namespace = %namespace,
                    error = %cleanup,
                    "Cleanup after failed deploy also failed"
                );
            }
            return Err(err.into());
        }

        Ok(Self {
            cluster,
            namespace,
            workload,
        })
    }

    pub fn cluster(&self) -> &TestCluster {
        &self.cluster
    }

    /// Namespace this scenario deployed into.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Container name the monitoring stack will report for the workload.
    pub fn container_name(&self) -> &str {
        self.workload.container_name()
    }

    /// Delete the scenario namespace.
    ///
    /// Tests run this before asserting on the poll outcome so a failed
    /// scenario still cleans up after itself. Deletion is asynchronous on
    /// the cluster side.
    pub async fn teardown(self) -> Result<(), ScenarioError> {
        self.cluster.delete_namespace(&self.namespace).await?;
        Ok(())
    }
}
