/// Resource metrics API (metrics.k8s.io/v1beta1) types and reads
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

use super::quantity::{self, QuantityError};

pub const METRICS_API_GROUP: &str = "metrics.k8s.io";
pub const METRICS_API_VERSION: &str = "v1beta1";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub cpu: Quantity,
    pub memory: Quantity,
}

impl Usage {
    pub fn cpu_millicores(&self) -> Result<f64, QuantityError> {
        quantity::cpu_millicores(&self.cpu.0)
    }

    pub fn memory_bytes(&self) -> Result<f64, QuantityError> {
        quantity::memory_bytes(&self.memory.0)
    }

    pub fn memory_ki(&self) -> Result<f64, QuantityError> {
        quantity::memory_ki(&self.memory.0)
    }

    pub fn memory_mib(&self) -> Result<f64, QuantityError> {
        quantity::memory_mib(&self.memory.0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerMetrics {
    pub name: String,
    pub usage: Usage,
}

/// Resource usage of every container in a pod
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PodMetrics {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub window: Option<String>,
    #[serde(default)]
    pub containers: Vec<ContainerMetrics>,
}

/// Resource usage of a node
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMetrics {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub window: Option<String>,
    pub usage: Usage,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsList<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

impl PodMetrics {
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or_default()
    }

    /// Total CPU (millicores) and memory (Ki) across containers
    pub fn totals(&self) -> Result<(f64, f64), QuantityError> {
        self.containers
            .iter()
            .try_fold((0.0, 0.0), |(cpu, memory), container| {
                Ok((
                    cpu + container.usage.cpu_millicores()?,
                    memory + container.usage.memory_ki()?,
                ))
            })
    }
}

impl NodeMetrics {
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }
}

pub(super) fn metrics_path(namespace: Option<&str>, plural: &str) -> String {
    match namespace {
        Some(ns) => format!(
            "/apis/{}/{}/namespaces/{}/{}",
            METRICS_API_GROUP, METRICS_API_VERSION, ns, plural
        ),
        None => format!("/apis/{}/{}/{}", METRICS_API_GROUP, METRICS_API_VERSION, plural),
    }
}
