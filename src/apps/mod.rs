/// Read-only application handlers: inventory, pods, deployment configuration
pub mod lifecycle;
pub mod logs;

use std::collections::{BTreeMap, HashMap};

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use serde::Serialize;
use tracing::{info, warn};

use crate::k8s::metrics::PodMetrics;
use crate::k8s::ClusterApi;
use crate::tools::ToolError;

/// A pod and its lifecycle phase
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PodStatus {
    pub name: String,
    pub status: String,
}

/// The interesting parts of a deployment's spec
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentConfig {
    pub replicas: Option<i32>,
    pub strategy: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub containers: Vec<ContainerConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerConfig {
    pub name: String,
    pub image: Option<String>,
    pub ports: Vec<i32>,
}

/// Resource usage of one pod of an application
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PodUsage {
    pub pod_name: String,
    pub cpu_millicores: f64,
    pub memory_ki: f64,
}

/// Summary row for one application
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationOverview {
    pub name: String,
    pub registered: Option<String>,
    pub available: bool,
    pub memory_ki: f64,
    pub pods: Vec<PodUsage>,
}

/// Names of all deployments in the namespace
pub async fn list_applications(cluster: &dyn ClusterApi) -> Result<Vec<String>, ToolError> {
    let deployments = cluster
        .list_deployments()
        .await
        .map_err(ToolError::cluster("failed to list applications"))?;

    let names: Vec<String> = deployments.iter().map(|d| d.name_any()).collect();
    info!("Found {} applications", names.len());
    Ok(names)
}

/// Pods of an application with their phase
pub async fn pod_statuses(
    cluster: &dyn ClusterApi,
    app_name: &str,
) -> Result<Vec<PodStatus>, ToolError> {
    let pods = cluster
        .list_app_pods(app_name)
        .await
        .map_err(ToolError::cluster("failed to list pods"))?;
    Ok(pods.iter().map(pod_status).collect())
}

/// Name and phase of a pod, `Unknown` when the phase is not reported
pub fn pod_status(pod: &Pod) -> PodStatus {
    PodStatus {
        name: pod.name_any(),
        status: pod
            .status
            .as_ref()
            .and_then(|status| status.phase.clone())
            .unwrap_or_else(|| "Unknown".to_string()),
    }
}

/// Deployment configuration of an application
pub async fn deployment_config(
    cluster: &dyn ClusterApi,
    app_name: &str,
) -> Result<DeploymentConfig, ToolError> {
    let deployment = cluster
        .get_deployment(app_name)
        .await
        .map_err(ToolError::cluster("failed to fetch deployment config"))?;
    Ok(describe_deployment(&deployment))
}

/// Replicas, strategy, metadata and containers of a deployment
pub fn describe_deployment(deployment: &Deployment) -> DeploymentConfig {
    let spec = deployment.spec.as_ref();
    let containers = spec
        .and_then(|spec| spec.template.spec.as_ref())
        .map(|pod| {
            pod.containers
                .iter()
                .map(|container| ContainerConfig {
                    name: container.name.clone(),
                    image: container.image.clone(),
                    ports: container
                        .ports
                        .iter()
                        .flatten()
                        .map(|port| port.container_port)
                        .collect(),
                })
                .collect()
        })
        .unwrap_or_default();

    DeploymentConfig {
        replicas: spec.and_then(|spec| spec.replicas),
        strategy: spec
            .and_then(|spec| spec.strategy.as_ref())
            .and_then(|strategy| strategy.type_.clone()),
        labels: deployment.labels().clone(),
        annotations: deployment.annotations().clone(),
        containers,
    }
}

/// Availability and resource usage of every application
pub async fn applications_overview(
    cluster: &dyn ClusterApi,
) -> Result<Vec<ApplicationOverview>, ToolError> {
    let deployments = cluster
        .list_deployments()
        .await
        .map_err(ToolError::cluster("failed to list applications"))?;
    let pods = cluster
        .list_pods()
        .await
        .map_err(ToolError::cluster("failed to list pods"))?;

    // Usage is best effort; the metrics API is optional on many clusters
    let metrics = cluster
        .namespace_pod_metrics()
        .await
        .inspect_err(|err| warn!(?err, "Failed to fetch pod metrics"))
        .unwrap_or_default();

    Ok(build_overview(&deployments, &pods, &metrics))
}

/// Join deployments with their pods (by `app` label) and per-pod usage
pub fn build_overview(
    deployments: &[Deployment],
    pods: &[Pod],
    metrics: &[PodMetrics],
) -> Vec<ApplicationOverview> {
    let usage: HashMap<&str, (f64, f64)> = metrics
        .iter()
        .filter_map(|pod| match pod.totals() {
            Ok(totals) => Some((pod.name(), totals)),
            Err(err) => {
                warn!(pod = pod.name(), %err, "Ignoring malformed pod metrics");
                None
            }
        })
        .collect();

    deployments
        .iter()
        .map(|deployment| {
            let name = deployment.name_any();
            let pods: Vec<PodUsage> = pods
                .iter()
                .filter(|pod| pod.labels().get("app") == Some(&name))
                .map(|pod| {
                    let pod_name = pod.name_any();
                    let (cpu_millicores, memory_ki) =
                        usage.get(pod_name.as_str()).copied().unwrap_or_default();
                    PodUsage {
                        pod_name,
                        cpu_millicores,
                        memory_ki,
                    }
                })
                .collect();

            ApplicationOverview {
                registered: deployment
                    .metadata
                    .creation_timestamp
                    .as_ref()
                    .and_then(|time| serde_json::to_value(time).ok())
                    .and_then(|value| value.as_str().map(str::to_string)),
                available: deployment
                    .status
                    .as_ref()
                    .and_then(|status| status.available_replicas)
                    .is_some_and(|available| available > 0),
                memory_ki: pods.iter().map(|pod| pod.memory_ki).sum(),
                pods,
                name,
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::{DeploymentStatus, DeploymentStrategy};
    use k8s_openapi::api::core::v1::PodStatus as CorePodStatus;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    use crate::k8s::client::tests::unreachable;
    use crate::k8s::client::MockClusterApi;
    use crate::k8s::metrics::{ContainerMetrics, Usage};
    use crate::k8s::resources;

    pub(crate) fn pod(name: &str, app: &str, phase: Option<&str>) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some([("app".to_string(), app.to_string())].into_iter().collect()),
                ..Default::default()
            },
            status: Some(CorePodStatus {
                phase: phase.map(str::to_string),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn pod_metrics(name: &str, cpu: &str, memory: &str) -> PodMetrics {
        PodMetrics {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            containers: vec![ContainerMetrics {
                name: "app".to_string(),
                usage: Usage {
                    cpu: k8s_openapi::apimachinery::pkg::api::resource::Quantity(cpu.to_string()),
                    memory: k8s_openapi::apimachinery::pkg::api::resource::Quantity(
                        memory.to_string(),
                    ),
                },
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_pod_status() {
        assert_eq!(
            pod_status(&pod("orders-1", "orders", Some("Running"))),
            PodStatus {
                name: "orders-1".to_string(),
                status: "Running".to_string()
            }
        );
        assert_eq!(pod_status(&pod("orders-2", "orders", None)).status, "Unknown");
    }

    #[test]
    fn test_describe_deployment() {
        let mut deployment = resources::deployment("orders", "quay.io/acme/orders:2", 2, Some(8080));
        if let Some(spec) = deployment.spec.as_mut() {
            spec.strategy = Some(DeploymentStrategy {
                type_: Some("RollingUpdate".to_string()),
                ..Default::default()
            });
        }

        let config = describe_deployment(&deployment);
        assert_eq!(config.replicas, Some(2));
        assert_eq!(config.strategy.as_deref(), Some("RollingUpdate"));
        assert_eq!(config.labels.get("app").map(String::as_str), Some("orders"));
        assert!(config.annotations.is_empty());
        assert_eq!(
            config.containers,
            vec![ContainerConfig {
                name: "orders".to_string(),
                image: Some("quay.io/acme/orders:2".to_string()),
                ports: vec![8080],
            }]
        );
    }

    #[test]
    fn test_build_overview() {
        let mut orders = resources::deployment("orders", "img", 2, None);
        orders.status = Some(DeploymentStatus {
            available_replicas: Some(2),
            ..Default::default()
        });
        let billing = resources::deployment("billing", "img", 1, None);

        let pods = vec![
            pod("orders-1", "orders", Some("Running")),
            pod("orders-2", "orders", Some("Running")),
            pod("billing-1", "billing", Some("Pending")),
        ];
        let metrics = vec![
            pod_metrics("orders-1", "10m", "1024Ki"),
            pod_metrics("orders-2", "20m", "2Mi"),
            pod_metrics("billing-1", "bogus", "1Mi"),
        ];

        let overview = build_overview(&[orders, billing], &pods, &metrics);
        assert_eq!(overview.len(), 2);

        let orders = &overview[0];
        assert_eq!(orders.name, "orders");
        assert!(orders.available);
        assert_eq!(orders.pods.len(), 2);
        assert!((orders.memory_ki - 3072.0).abs() < 1e-9);
        assert!((orders.pods[1].cpu_millicores - 20.0).abs() < 1e-9);

        let billing = &overview[1];
        assert!(!billing.available);
        assert_eq!(billing.pods.len(), 1);
        assert_eq!(billing.memory_ki, 0.0);
    }

    #[tokio::test]
    async fn test_pod_statuses_select_application_pods() {
        let mut cluster = MockClusterApi::new();
        cluster
            .expect_list_app_pods()
            .withf(|app| app == "orders")
            .times(1)
            .returning(|_| Ok(vec![pod("orders-1", "orders", Some("Running"))]));

        let statuses = pod_statuses(&cluster, "orders").await.unwrap();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].status, "Running");
    }

    #[tokio::test]
    async fn test_applications_overview_without_metrics_api() {
        let mut cluster = MockClusterApi::new();
        cluster
            .expect_list_deployments()
            .returning(|| Ok(vec![resources::deployment("orders", "img", 1, None)]));
        cluster
            .expect_list_pods()
            .returning(|| Ok(vec![pod("orders-1", "orders", Some("Running"))]));
        cluster
            .expect_namespace_pod_metrics()
            .returning(|| Err(unreachable()));

        let overview = applications_overview(&cluster).await.unwrap();
        assert_eq!(overview.len(), 1);
        assert_eq!(overview[0].pods[0].pod_name, "orders-1");
        assert_eq!(overview[0].memory_ki, 0.0);
    }

    #[tokio::test]
    async fn test_list_applications_failure() {
        let mut cluster = MockClusterApi::new();
        cluster
            .expect_list_deployments()
            .returning(|| Err(unreachable()));

        let err = list_applications(&cluster).await.unwrap_err();
        assert!(err.to_string().starts_with("failed to list applications:"));
    }
}
