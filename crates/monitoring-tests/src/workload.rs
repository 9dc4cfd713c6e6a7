//! Deployable workload fixture.
//!
//! Every scenario deploys the same single-container Deployment manifest,
//! decoded from `testdata/monitoring-deploy.yaml`. The crash-loop
//! scenarios override the container command with one that exits
//! immediately, which drives the pod into a restart loop without needing
//! a special image.

use std::path::Path;

use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{Api, PostParams};
use thiserror::Error;
use tracing::info;

use crate::cluster::TestCluster;

/// Default manifest location, resolved at compile time so tests can run
/// from any working directory.
const DEFAULT_MANIFEST: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/testdata/monitoring-deploy.yaml"
);

#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("Failed to read manifest {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode manifest {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Manifest {path} defines no containers")]
    NoContainers { path: String },

    #[error("Failed to create deployment in namespace {namespace}: {source}")]
    Create {
        namespace: String,
        #[source]
        source: kube::Error,
    },
}

/// A Deployment manifest ready to submit to a test namespace.
///
/// Loading validates that the manifest defines at least one container;
/// the first container's name is what the monitoring stack reports.
#[derive(Debug, Clone)]
pub struct Workload {
    deployment: Deployment,
    container: String,
    origin: String,
}

impl Workload {
    /// Load the default monitoring workload manifest.
    pub fn monitoring_default() -> Result<Self, WorkloadError> {
        Self::from_fixture(DEFAULT_MANIFEST)
    }

    /// Load a Deployment manifest from a YAML fixture.
    pub fn from_fixture(path: impl AsRef<Path>) -> Result<Self, WorkloadError> {
        let path = path.as_ref();
        let origin = path.display().to_string();
        let yaml = std::fs::read_to_string(path).map_err(|source| WorkloadError::Read {
            path: origin.clone(),
            source,
        })?;
        Self::from_yaml(&yaml, origin)
    }

    fn from_yaml(yaml: &str, origin: String) -> Result<Self, WorkloadError> {
        let deployment: Deployment =
            serde_yaml::from_str(yaml).map_err(|source| WorkloadError::Decode {
                path: origin.clone(),
                source,
            })?;

        // Reject container-less manifests at load time
        let container = deployment
            .spec
            .as_ref()
            .and_then(|spec| spec.template.spec.as_ref())
            .and_then(|pod| pod.containers.first())
            .map(|container| container.name.clone())
            .ok_or_else(|| WorkloadError::NoContainers {
                path: origin.clone(),
            })?;

        Ok(Self {
            deployment,
            container,
            origin,
        })
    }

    /// Name of the first container in the pod template, as the monitoring
    /// stack will label it. Validated at load time.
    pub fn container_name(&self) -> &str {
        &self.container
    }

    /// Override the first container's command.
    pub fn with_command<I, S>(mut self, command: I) -> Result<Self, WorkloadError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let container = self
            .deployment
            .spec
            .as_mut()
            .and_then(|spec| spec.template.spec.as_mut())
            .and_then(|pod| pod.containers.first_mut())
            .ok_or_else(|| WorkloadError::NoContainers {
                path: self.origin.clone(),
            })?;

        container.command = Some(command.into_iter().map(Into::into).collect());
        Ok(self)
    }

    /// Rewrite the container to exit immediately, driving the pod into a
    /// crash loop once the kubelet restarts it.
    pub fn crash_looping(self) -> Result<Self, WorkloadError> {
        self.with_command(["echo"])
    }

    /// Submit the Deployment to `namespace`.
    ///
    /// Does not wait for rollout: the monitoring stack is expected to
    /// observe the pods on its own, and a crash-looping workload never
    /// becomes ready anyway.
    pub async fn deploy(
        &self,
        cluster: &TestCluster,
        namespace: &str,
    ) -> Result<Deployment, WorkloadError> {
        let api: Api<Deployment> = Api::namespaced(cluster.client(), namespace);

        let created = api
            .create(&PostParams::default(), &self.deployment)
            .await
            .map_err(|source| WorkloadError::Create {
                namespace: namespace.to_string(),
                source,
            })?;

        info!(
            namespace = %namespace,
            name = ?created.metadata.name,
            "Created workload deployment"
        );

        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest_loads() {
        let workload = Workload::monitoring_default().expect("Fixture manifest should decode");
        assert_eq!(workload.container_name(), "monitoring-test");
    }

    #[test]
    fn test_crash_looping_overrides_command() {
        let workload = Workload::monitoring_default()
            .expect("Fixture manifest should decode")
            .crash_looping()
            .expect("Fixture should have a container");

        let command = workload
            .deployment
            .spec
            .as_ref()
            .and_then(|spec| spec.template.spec.as_ref())
            .and_then(|pod| pod.containers.first())
            .and_then(|container| container.command.clone());

        assert_eq!(command, Some(vec!["echo".to_string()]));
    }

    #[test]
    fn test_with_command_replaces_whole_argv() {
        let workload = Workload::monitoring_default()
            .expect("Fixture manifest should decode")
            .with_command(["sh", "-c", "exit 1"])
            .expect("Fixture should have a container");

        let command = workload
            .deployment
            .spec
            .as_ref()
            .and_then(|spec| spec.template.spec.as_ref())
            .and_then(|pod| pod.containers.first())
            .and_then(|container| container.command.clone());

        assert_eq!(
            command,
            Some(vec![
                "sh".to_string(),
                "-c".to_string(),
                "exit 1".to_string()
            ])
        );
    }

    #[test]
    fn test_crash_looping_rewrites_only_first_container() {
        let yaml = r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: two-containers
spec:
  selector:
    matchLabels:
      app: two-containers
  template:
    metadata:
      labels:
        app: two-containers
    spec:
      containers:
        - name: first
          image: nginx:1.25
        - name: second
          image: nginx:1.25
          command: ["nginx"]
"#;
        let workload = Workload::from_yaml(yaml, "inline".to_string())
            .expect("Manifest should decode")
            .crash_looping()
            .expect("Manifest should have a container");

        let containers = workload
            .deployment
            .spec
            .as_ref()
            .and_then(|spec| spec.template.spec.as_ref())
            .map(|pod| pod.containers.as_slice())
            .expect("Pod spec expected");

        assert_eq!(workload.container_name(), "first");
        assert_eq!(containers[0].command, Some(vec!["echo".to_string()]));
        assert_eq!(containers[1].command, Some(vec!["nginx".to_string()]));
    }

    #[test]
    fn test_manifest_without_containers_is_rejected() {
        let yaml = r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: empty
spec:
  selector:
    matchLabels:
      app: empty
  template:
    metadata:
      labels:
        app: empty
    spec:
      containers: []
"#;
        let result = Workload::from_yaml(yaml, "inline".to_string());
        assert!(matches!(result, Err(WorkloadError::NoContainers { .. })));
    }

    #[test]
    fn test_garbage_manifest_is_a_decode_error() {
        let result = Workload::from_yaml("not: [valid, deployment", "inline".to_string());
        assert!(matches!(result, Err(WorkloadError::Decode { .. })));
    }

    #[test]
    fn test_missing_fixture_is_a_read_error() {
        let result = Workload::from_fixture("/does/not/exist.yaml");
        assert!(matches!(result, Err(WorkloadError::Read { .. })));
    }
}
