//! Cluster connection and namespace utilities.
//!
//! This module provides the `TestCluster` type: a `kube::Client` built from
//! ambient configuration plus helpers for isolated test namespaces and for
//! reaching in-cluster services through the API server's service proxy.

use http::Request;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::version::Info;
use kube::api::{Api, DeleteParams, ObjectMeta, PostParams};
use kube::Client;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{ConfigError, MonitoringConfig, ServiceRef};

/// Cluster access errors.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("Failed to load monitoring configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to build Kubernetes client from ambient config (kubeconfig or in-cluster): {0}")]
    ClientInit(#[source] kube::Error),

    #[error("API server version check failed: {0}")]
    ApiServer(#[source] kube::Error),

    #[error("Failed to create namespace {name}: {source}")]
    NamespaceCreate {
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("Failed to delete namespace {name}: {source}")]
    NamespaceDelete {
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("Failed to look up namespace {name}: {source}")]
    NamespaceLookup {
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("Invalid proxy request for {uri}: {source}")]
    ProxyRequest {
        uri: String,
        #[source]
        source: http::Error,
    },

    #[error("Proxy request to {uri} failed: {source}")]
    ProxyGet {
        uri: String,
        #[source]
        source: kube::Error,
    },
}

/// Connection to the cluster under test.
///
/// Wraps a `kube::Client` built from ambient configuration (kubeconfig or
/// in-cluster service account) together with the monitoring stack's
/// location. Cloning is cheap; the underlying client is shared.
#[derive(Clone)]
pub struct TestCluster {
    client: Client,
    config: MonitoringConfig,
}

impl TestCluster {
    /// Connect using ambient cluster credentials and `MONITORING_*`
    /// environment overrides.
    pub async fn connect() -> Result<Self, ClusterError> {
        Self::connect_with_config(MonitoringConfig::from_env()?).await
    }

    /// Connect with an explicit configuration.
    pub async fn connect_with_config(config: MonitoringConfig) -> Result<Self, ClusterError> {
        let client = Client::try_default()
            .await
            .map_err(ClusterError::ClientInit)?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &MonitoringConfig {
        &self.config
    }

    /// Get a client handle for direct API access.
    pub fn client(&self) -> Client {
        self.client.clone()
    }

    /// Fetch the API server version, confirming the control plane is
    /// reachable and the credentials are accepted.
    pub async fn apiserver_version(&self) -> Result<Info, ClusterError> {
        self.client
            .apiserver_version()
            .await
            .map_err(ClusterError::ApiServer)
    }

    /// Create a uniquely named namespace for one scenario.
    ///
    /// The name is `prefix` plus an 8-character uuid suffix, and the
    /// namespace is labeled so that leftovers from interrupted runs are
    /// identifiable. Returns the generated name.
    pub async fn create_test_namespace(&self, prefix: &str) -> Result<String, ClusterError> {
        let id = Uuid::new_v4().to_string();
        let name = format!("{prefix}{}", &id[..8]);

        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                labels: Some(
                    [(
                        "app.kubernetes.io/managed-by".to_string(),
                        "monitoring-tests".to_string(),
                    )]
                    .into_iter()
                    .collect(),
                ),
                ..Default::default()
            },
            ..Default::default()
        };

        namespaces
            .create(&PostParams::default(), &ns)
            .await
            .map_err(|source| ClusterError::NamespaceCreate {
                name: name.clone(),
                source,
            })?;

        info!(namespace = %name, "Created test namespace");
        Ok(name)
    }

    /// Delete a test namespace.
    ///
    /// Deletion is asynchronous on the cluster side; the namespace lingers
    /// in `Terminating` phase while its contents are reaped.
    pub async fn delete_namespace(&self, name: &str) -> Result<(), ClusterError> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());

        namespaces
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|source| ClusterError::NamespaceDelete {
                name: name.to_string(),
                source,
            })?;

        info!(namespace = %name, "Deleted test namespace");
        Ok(())
    }

    /// Whether a namespace is absent (404) or at least `Terminating`.
    pub async fn namespace_is_gone(&self, name: &str) -> Result<bool, ClusterError> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());

        match namespaces.get(name).await {
            Ok(ns) => {
                let phase = ns.status.and_then(|s| s.phase);
                Ok(phase == Some("Terminating".to_string()))
            }
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(true),
            Err(source) => Err(ClusterError::NamespaceLookup {
                name: name.to_string(),
                source,
            }),
        }
    }

    /// HTTP GET against an in-cluster service through the API server's
    /// service proxy, returning the raw response body.
    ///
    /// Transport failures and non-2xx responses both surface as
    /// [`ClusterError::ProxyGet`]; poll loops treat them as transient.
    pub async fn proxy_get(
        &self,
        service: &ServiceRef,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<String, ClusterError> {
        let uri = proxy_uri(&self.config.namespace, service, path, params);
        debug!(%uri, "GET via service proxy");

        let request = Request::get(uri.as_str())
            .body(Vec::new())
            .map_err(|source| ClusterError::ProxyRequest {
                uri: uri.clone(),
                source,
            })?;

        self.client
            .request_text(request)
            .await
            .map_err(|source| ClusterError::ProxyGet { uri, source })
    }
}

/// Build the API server path that proxies to `service` inside the
/// monitoring namespace:
/// `/api/v1/namespaces/{ns}/services/{scheme}:{name}:{port}/proxy/{path}`.
///
/// A leading slash on `path` is tolerated so configured path prefixes
/// (e.g. `/alertmanager`) join cleanly; query parameters are
/// percent-encoded.
fn proxy_uri(namespace: &str, service: &ServiceRef, path: &str, params: &[(&str, &str)]) -> String {
    let base = format!(
        "/api/v1/namespaces/{}/services/{}:{}:{}/proxy/{}",
        namespace,
        service.scheme,
        service.name,
        service.port,
        path.trim_start_matches('/'),
    );

    if params.is_empty() {
        return base;
    }

    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();
    format!("{base}?{query}")
}
