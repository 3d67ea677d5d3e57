/// Cluster health checks: API server, node readiness, resource utilization
///
/// Checks never fail outright. Problems reaching the cluster are reported as a
/// [`HealthReport`] with [`HealthStatus::Error`] so a caller always gets a verdict.
use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::HealthThresholds;
use crate::k8s::metrics::{NodeMetrics, PodMetrics};
use crate::k8s::{nodes, ClusterApi};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnhealthyNode {
    pub node_name: String,
    pub condition: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HighUsageNode {
    pub node_name: String,
    pub cpu_millicores: f64,
    pub memory_mib: f64,
    pub cpu_percent: Option<f64>,
    pub memory_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HighUsageContainer {
    pub pod_name: String,
    pub namespace: String,
    pub container: String,
    pub cpu_millicores: f64,
    pub memory_mib: f64,
}

/// Verdict of a health check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unhealthy_nodes: Vec<UnhealthyNode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub high_usage_nodes: Vec<HighUsageNode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub high_usage_pods: Vec<HighUsageContainer>,
}

impl HealthReport {
    pub fn new(status: HealthStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            response: None,
            unhealthy_nodes: Vec::new(),
            high_usage_nodes: Vec::new(),
            high_usage_pods: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(HealthStatus::Error, message)
    }

    fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = Some(response.into());
        self
    }
}

/// Probe the API server's `/healthz` endpoint
pub async fn critical_components(cluster: &dyn ClusterApi) -> HealthReport {
    match cluster.healthz().await {
        Ok(body) => {
            info!("API server /healthz: {}", body.trim());
            HealthReport::new(HealthStatus::Healthy, "All critical components are healthy.")
                .with_response(format!("/healthz endpoint response is {}", body.trim()))
        }
        Err(err) => {
            warn!(?err, "API server health probe failed");
            HealthReport::new(HealthStatus::Unhealthy, "API server is not healthy.")
                .with_response(format!("/healthz endpoint response is {}", err))
        }
    }
}

/// Report nodes whose `Ready` condition is not `True`
pub async fn cluster_nodes(cluster: &dyn ClusterApi) -> HealthReport {
    match cluster.list_nodes().await {
        Ok(nodes) => classify_nodes(&nodes),
        Err(err) => HealthReport::error(format!("Error checking cluster nodes health: {}", err)),
    }
}

/// Healthy unless some node is not `Ready=True`
pub fn classify_nodes(nodes: &[Node]) -> HealthReport {
    let unhealthy_nodes: Vec<UnhealthyNode> = nodes
        .iter()
        .filter(|node| !nodes::is_ready(node))
        .map(|node| {
            let (condition, status) = nodes::ready_condition(node)
                .map(|c| (c.type_.clone(), c.status.clone()))
                .unwrap_or_else(|| ("Ready".to_string(), "Unknown".to_string()));
            UnhealthyNode {
                node_name: node.name_any(),
                condition,
                status,
            }
        })
        .collect();

    if unhealthy_nodes.is_empty() {
        return HealthReport::new(HealthStatus::Healthy, "All nodes are healthy.");
    }

    let message = format!("{} node(s) are unhealthy.", unhealthy_nodes.len());
    HealthReport {
        unhealthy_nodes,
        ..HealthReport::new(HealthStatus::Unhealthy, message)
    }
}

/// Compare node and container usage against the configured thresholds
pub async fn resource_utilization(
    cluster: &dyn ClusterApi,
    thresholds: &HealthThresholds,
) -> HealthReport {
    let node_metrics = match cluster.node_metrics().await {
        Ok(metrics) => metrics,
        Err(err) => return HealthReport::error(format!("Error fetching node metrics: {}", err)),
    };
    let pod_metrics = match cluster.cluster_pod_metrics().await {
        Ok(metrics) => metrics,
        Err(err) => return HealthReport::error(format!("Error fetching pod metrics: {}", err)),
    };
    // Nodes without allocatable figures are not judged
    let nodes = cluster
        .list_nodes()
        .await
        .inspect_err(|err| warn!(?err, "Failed to list nodes for allocatable capacity"))
        .unwrap_or_default();

    analyze_utilization(&nodes, &node_metrics, &pod_metrics, thresholds)
}

/// Warn about nodes above their allocatable share and containers above the absolute limits
pub fn analyze_utilization(
    nodes: &[Node],
    node_metrics: &[NodeMetrics],
    pod_metrics: &[PodMetrics],
    thresholds: &HealthThresholds,
) -> HealthReport {
    let high_usage_nodes: Vec<HighUsageNode> = node_metrics
        .iter()
        .filter_map(|metrics| node_usage(nodes, metrics))
        .filter(|usage| {
            usage.cpu_percent.is_some_and(|p| p > thresholds.node_cpu_percent)
                || usage
                    .memory_percent
                    .is_some_and(|p| p > thresholds.node_memory_percent)
        })
        .collect();

    let high_usage_pods: Vec<HighUsageContainer> = pod_metrics
        .iter()
        .flat_map(|pod| {
            pod.containers.iter().filter_map(move |container| {
                let usage = &container.usage;
                match (usage.cpu_millicores(), usage.memory_mib()) {
                    (Ok(cpu_millicores), Ok(memory_mib)) => Some(HighUsageContainer {
                        pod_name: pod.name().to_string(),
                        namespace: pod.namespace().to_string(),
                        container: container.name.clone(),
                        cpu_millicores,
                        memory_mib,
                    }),
                    (Err(err), _) | (_, Err(err)) => {
                        warn!(pod = pod.name(), %err, "Ignoring malformed container metrics");
                        None
                    }
                }
            })
        })
        .filter(|usage| {
            usage.cpu_millicores > thresholds.pod_cpu_millicores
                || usage.memory_mib > thresholds.pod_memory_mib
        })
        .collect();

    if high_usage_nodes.is_empty() && high_usage_pods.is_empty() {
        return HealthReport::new(
            HealthStatus::Healthy,
            "Resource utilization is within acceptable limits.",
        );
    }

    HealthReport {
        high_usage_nodes,
        high_usage_pods,
        ..HealthReport::new(HealthStatus::Warning, "High resource utilization detected.")
    }
}

fn node_usage(nodes: &[Node], metrics: &NodeMetrics) -> Option<HighUsageNode> {
    let (cpu_millicores, memory_bytes) =
        match (metrics.usage.cpu_millicores(), metrics.usage.memory_bytes()) {
            (Ok(cpu), Ok(memory)) => (cpu, memory),
            (Err(err), _) | (_, Err(err)) => {
                warn!(node = metrics.name(), %err, "Ignoring malformed node metrics");
                return None;
            }
        };

    let allocatable = nodes
        .iter()
        .find(|node| node.name_any() == metrics.name())
        .and_then(|node| {
            nodes::allocatable(node)
                .inspect_err(|err| warn!(node = metrics.name(), %err, "Malformed allocatable"))
                .ok()
                .flatten()
        });

    let percent = |used: f64, total: f64| (total > 0.0).then(|| used / total * 100.0);

    Some(HighUsageNode {
        node_name: metrics.name().to_string(),
        cpu_millicores,
        memory_mib: memory_bytes / (1024.0 * 1024.0),
        cpu_percent: allocatable.and_then(|(cpu, _)| percent(cpu_millicores, cpu)),
        memory_percent: allocatable.and_then(|(_, memory)| percent(memory_bytes, memory)),
    })
}
