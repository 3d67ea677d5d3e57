/// CPU and memory usage of application pods from the resource metrics API
use chrono::{DateTime, Utc};
use kube::ResourceExt;
use serde::Serialize;
use tracing::warn;

use crate::k8s::metrics::PodMetrics;
use crate::k8s::{ClusterApi, QuantityError};
use crate::tools::ToolError;

/// Point-in-time usage of one container of an application pod
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySample {
    pub time: DateTime<Utc>,
    pub pod_name: String,
    pub container: String,
    pub cpu_millicores: f64,
    pub memory_ki: f64,
}

/// Usage of one container as reported by the metrics API
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerUsage {
    pub pod_name: String,
    pub container: String,
    pub cpu_millicores: f64,
    pub memory_ki: f64,
    pub timestamp: Option<String>,
}

/// Current usage of every container of an application's pods.
///
/// Pods without readable metrics (not yet scraped, or malformed) are skipped.
pub async fn application_telemetry(
    cluster: &dyn ClusterApi,
    app_name: &str,
) -> Result<Vec<TelemetrySample>, ToolError> {
    let pods = cluster
        .list_app_pods(app_name)
        .await
        .map_err(ToolError::cluster("failed to list pods"))?;

    let now = Utc::now();
    let mut samples = Vec::new();
    for pod in pods {
        let pod_name = pod.name_any();
        let metrics = match cluster.pod_metrics(&pod_name).await {
            Ok(metrics) => metrics,
            Err(err) => {
                warn!(pod = %pod_name, ?err, "Failed to fetch metrics for pod");
                continue;
            }
        };
        match samples_for(&metrics, now) {
            Ok(pod_samples) => samples.extend(pod_samples),
            Err(err) => warn!(pod = %pod_name, %err, "Ignoring malformed pod metrics"),
        }
    }

    Ok(samples)
}

/// One sample per container of a pod, all stamped with `time`
pub fn samples_for(
    metrics: &PodMetrics,
    time: DateTime<Utc>,
) -> Result<Vec<TelemetrySample>, QuantityError> {
    metrics
        .containers
        .iter()
        .map(|container| {
            Ok(TelemetrySample {
                time,
                pod_name: metrics.name().to_string(),
                container: container.name.clone(),
                cpu_millicores: container.usage.cpu_millicores()?,
                memory_ki: container.usage.memory_ki()?,
            })
        })
        .collect()
}

/// Usage of every container in the namespace
pub async fn namespace_metrics(
    cluster: &dyn ClusterApi,
) -> Result<Vec<ContainerUsage>, ToolError> {
    let metrics = cluster
        .namespace_pod_metrics()
        .await
        .map_err(ToolError::cluster("failed to fetch pod metrics"))?;
    Ok(container_usage(&metrics))
}

/// Flatten pod metrics into per-container usage, skipping malformed quantities
pub fn container_usage(metrics: &[PodMetrics]) -> Vec<ContainerUsage> {
    metrics
        .iter()
        .flat_map(|pod| {
            pod.containers.iter().filter_map(move |container| {
                let usage = container
                    .usage
                    .cpu_millicores()
                    .and_then(|cpu| Ok((cpu, container.usage.memory_ki()?)));
                match usage {
                    Ok((cpu_millicores, memory_ki)) => Some(ContainerUsage {
                        pod_name: pod.name().to_string(),
                        container: container.name.clone(),
                        cpu_millicores,
                        memory_ki,
                        timestamp: pod.timestamp.clone(),
                    }),
                    Err(err) => {
                        warn!(pod = pod.name(), container = %container.name, %err, "Ignoring malformed container metrics");
                        None
                    }
                }
            })
        })
        .collect()
}
