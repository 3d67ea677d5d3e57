/// Namespaced Kubernetes API client
use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Node, Pod, Service};
use kube::api::{Api, ListParams, LogParams, Patch, PatchParams, PostParams};
#[cfg(test)]
use mockall::automock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use super::metrics::{metrics_path, MetricsList, NodeMetrics, PodMetrics};
use crate::config::AssistantConfig;

/// Cluster operations used by the tool handlers
///
/// Everything is scoped to one namespace except nodes and the cluster-wide metrics reads.
/// Handlers take `&dyn ClusterApi` so they can run against a mock in tests.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn list_deployments(&self) -> kube::Result<Vec<Deployment>>;

    async fn get_deployment(&self, name: &str) -> kube::Result<Deployment>;

    /// Apply a JSON merge patch to a deployment
    async fn merge_patch_deployment(&self, name: &str, patch: Value) -> kube::Result<Deployment>;

    /// Apply a strategic merge patch to a deployment
    async fn strategic_patch_deployment(
        &self,
        name: &str,
        patch: Value,
    ) -> kube::Result<Deployment>;

    async fn create_deployment(&self, deployment: Deployment) -> kube::Result<Deployment>;

    async fn create_service(&self, service: Service) -> kube::Result<Service>;

    async fn list_pods(&self) -> kube::Result<Vec<Pod>>;

    /// Pods belonging to an application (label `app=<name>`)
    async fn list_app_pods(&self, app_name: &str) -> kube::Result<Vec<Pod>>;

    /// Last `tail_lines` lines of a pod's log
    async fn pod_logs(&self, pod_name: &str, tail_lines: i64) -> kube::Result<String>;

    async fn list_nodes(&self) -> kube::Result<Vec<Node>>;

    /// Metrics for a single pod in the namespace
    async fn pod_metrics(&self, pod_name: &str) -> kube::Result<PodMetrics>;

    /// Metrics for every pod in the namespace
    async fn namespace_pod_metrics(&self) -> kube::Result<Vec<PodMetrics>>;

    /// Metrics for every pod in the cluster
    async fn cluster_pod_metrics(&self) -> kube::Result<Vec<PodMetrics>>;

    /// Metrics for every node in the cluster
    async fn node_metrics(&self) -> kube::Result<Vec<NodeMetrics>>;

    /// Body of the API server's `/healthz` endpoint
    async fn healthz(&self) -> kube::Result<String>;
}

/// Kubernetes client bound to the namespace all operations target
#[derive(Clone)]
pub struct ClusterClient {
    client: kube::Client,
    namespace: String,
}

impl ClusterClient {
    /// Connect using the configured API server and token, or the local kubeconfig when no
    /// server is configured
    pub async fn connect(config: &AssistantConfig) -> Result<Self> {
        let mut kube_config = match &config.cluster.server {
            Some(server) => {
                info!("Connecting to cluster API server: {}", server);
                let uri = server
                    .parse::<http::Uri>()
                    .context("Invalid cluster server URL")?;
                let mut kube_config = kube::Config::new(uri);
                kube_config.auth_info.token = Some(config.get_token()?.into());
                kube_config
            }
            None => {
                info!("No cluster server configured, inferring from kubeconfig");
                kube::Config::infer()
                    .await
                    .context("Failed to infer Kubernetes configuration")?
            }
        };

        let timeout = Duration::from_secs(config.cluster.timeout_secs);
        kube_config.accept_invalid_certs = config.cluster.insecure_skip_tls_verify;
        kube_config.default_namespace = config.namespace.clone();
        kube_config.connect_timeout = Some(timeout);
        kube_config.read_timeout = Some(timeout);

        let client =
            kube::Client::try_from(kube_config).context("Failed to create Kubernetes client")?;

        Ok(Self::new(client, config.namespace.clone()))
    }

    /// Wrap an existing client
    pub fn new(client: kube::Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    fn deployments(&self) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn pods(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn services(&self) -> Api<Service> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn nodes(&self) -> Api<Node> {
        Api::all(self.client.clone())
    }

    /// Fetch the raw response body for an API path
    async fn raw_get(&self, path: &str) -> kube::Result<String> {
        debug!("GET {}", path);
        let request = get_request(path)?;
        self.client.request_text(request).await
    }

    /// Fetch and decode a JSON document from an API path
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> kube::Result<T> {
        debug!("GET {}", path);
        let request = get_request(path)?;
        self.client.request(request).await
    }
}

#[async_trait]
impl ClusterApi for ClusterClient {
    async fn list_deployments(&self) -> kube::Result<Vec<Deployment>> {
        self.deployments()
            .list(&ListParams::default())
            .await
            .map(|list| list.items)
    }

    async fn get_deployment(&self, name: &str) -> kube::Result<Deployment> {
        self.deployments().get(name).await
    }

    async fn merge_patch_deployment(&self, name: &str, patch: Value) -> kube::Result<Deployment> {
        self.deployments()
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
    }

    async fn strategic_patch_deployment(
        &self,
        name: &str,
        patch: Value,
    ) -> kube::Result<Deployment> {
        self.deployments()
            .patch(name, &PatchParams::default(), &Patch::Strategic(&patch))
            .await
    }

    async fn create_deployment(&self, deployment: Deployment) -> kube::Result<Deployment> {
        self.deployments()
            .create(&PostParams::default(), &deployment)
            .await
    }

    async fn create_service(&self, service: Service) -> kube::Result<Service> {
        self.services().create(&PostParams::default(), &service).await
    }

    async fn list_pods(&self) -> kube::Result<Vec<Pod>> {
        self.pods()
            .list(&ListParams::default())
            .await
            .map(|list| list.items)
    }

    async fn list_app_pods(&self, app_name: &str) -> kube::Result<Vec<Pod>> {
        let lp = app_selector(app_name);
        debug!(app_name, namespace = %self.namespace, "listing application pods");
        self.pods().list(&lp).await.map(|list| list.items)
    }

    async fn pod_logs(&self, pod_name: &str, tail_lines: i64) -> kube::Result<String> {
        let lp = LogParams {
            tail_lines: Some(tail_lines),
            ..LogParams::default()
        };
        self.pods().logs(pod_name, &lp).await
    }

    async fn list_nodes(&self) -> kube::Result<Vec<Node>> {
        self.nodes()
            .list(&ListParams::default())
            .await
            .map(|list| list.items)
    }

    async fn pod_metrics(&self, pod_name: &str) -> kube::Result<PodMetrics> {
        let path = format!("{}/{}", metrics_path(Some(&self.namespace), "pods"), pod_name);
        self.get_json(&path).await
    }

    async fn namespace_pod_metrics(&self) -> kube::Result<Vec<PodMetrics>> {
        let path = metrics_path(Some(&self.namespace), "pods");
        self.get_json::<MetricsList<PodMetrics>>(&path)
            .await
            .map(|list| list.items)
    }

    async fn cluster_pod_metrics(&self) -> kube::Result<Vec<PodMetrics>> {
        let path = metrics_path(None, "pods");
        self.get_json::<MetricsList<PodMetrics>>(&path)
            .await
            .map(|list| list.items)
    }

    async fn node_metrics(&self) -> kube::Result<Vec<NodeMetrics>> {
        let path = metrics_path(None, "nodes");
        self.get_json::<MetricsList<NodeMetrics>>(&path)
            .await
            .map(|list| list.items)
    }

    async fn healthz(&self) -> kube::Result<String> {
        self.raw_get("/healthz").await
    }
}

impl std::fmt::Debug for ClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterClient")
            .field("namespace", &self.namespace)
            .field("client", &"<kube::Client>")
            .finish()
    }
}

/// Label selector shared by every per-application lookup
pub fn app_selector(app_name: &str) -> ListParams {
    ListParams::default().labels(&format!("app={}", app_name))
}

fn get_request(path: &str) -> kube::Result<http::Request<Vec<u8>>> {
    http::Request::get(path)
        .body(Vec::new())
        .map_err(kube::Error::HttpError)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Error returned by a mock cluster that cannot be reached
    pub(crate) fn unreachable() -> kube::Error {
        kube::Error::Service("connection refused".into())
    }

    #[test]
    fn test_app_selector() {
        let lp = app_selector("orders");
        assert_eq!(lp.label_selector.as_deref(), Some("app=orders"));
    }

    #[test]
    fn test_get_request_path() {
        let request = get_request("/apis/metrics.k8s.io/v1beta1/nodes").unwrap();
        assert_eq!(request.method(), http::Method::GET);
        assert_eq!(request.uri().path(), "/apis/metrics.k8s.io/v1beta1/nodes");
    }
}
