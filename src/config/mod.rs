/// Configuration management for Shiftops
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Namespace every operation targets unless overridden
pub const DEFAULT_NAMESPACE: &str = "mindovermachinestech-dev";

/// Environment variable holding the cluster bearer token
pub const TOKEN_ENV_VAR: &str = "SHIFTOPS_TOKEN";

/// Main assistant configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Namespace all application operations run in
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Cluster connection settings
    #[serde(default)]
    pub cluster: ClusterConnection,

    /// Defaults applied when a tool request omits an argument
    #[serde(default)]
    pub defaults: ToolDefaults,

    /// Resource utilization thresholds
    #[serde(default)]
    pub health: HealthThresholds,
}

/// How to reach the cluster API server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConnection {
    /// API server URL. When unset the local kubeconfig (or in-cluster config) is used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// Bearer token (can also be set via SHIFTOPS_TOKEN env var)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Skip TLS certificate verification
    #[serde(default)]
    pub insecure_skip_tls_verify: bool,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Argument defaults for tool requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefaults {
    #[serde(default = "default_tail_lines")]
    pub tail_lines: i64,

    #[serde(default = "default_replicas")]
    pub replicas: i32,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Thresholds used by the resource utilization health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthThresholds {
    /// Node CPU usage, as a percentage of allocatable
    #[serde(default = "default_percent")]
    pub node_cpu_percent: f64,

    /// Node memory usage, as a percentage of allocatable
    #[serde(default = "default_percent")]
    pub node_memory_percent: f64,

    /// Per-container CPU usage in millicores
    #[serde(default = "default_pod_cpu_millicores")]
    pub pod_cpu_millicores: f64,

    /// Per-container memory usage in MiB
    #[serde(default = "default_pod_memory_mib")]
    pub pod_memory_mib: f64,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_tail_lines() -> i64 {
    100
}

fn default_replicas() -> i32 {
    1
}

fn default_port() -> u16 {
    8080
}

fn default_percent() -> f64 {
    80.0
}

fn default_pod_cpu_millicores() -> f64 {
    500.0
}

fn default_pod_memory_mib() -> f64 {
    512.0
}

impl Default for ClusterConnection {
    fn default() -> Self {
        Self {
            server: None,
            token: None,
            insecure_skip_tls_verify: false,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ToolDefaults {
    fn default() -> Self {
        Self {
            tail_lines: default_tail_lines(),
            replicas: default_replicas(),
            port: default_port(),
        }
    }
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            node_cpu_percent: default_percent(),
            node_memory_percent: default_percent(),
            pod_cpu_millicores: default_pod_cpu_millicores(),
            pod_memory_mib: default_pod_memory_mib(),
        }
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            cluster: ClusterConnection::default(),
            defaults: ToolDefaults::default(),
            health: HealthThresholds::default(),
        }
    }
}

impl AssistantConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: AssistantConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        validate_namespace(&self.namespace)?;

        if let Some(server) = &self.cluster.server {
            let url = url::Url::parse(server)
                .map_err(|e| anyhow::anyhow!("Invalid cluster server URL {}: {}", server, e))?;
            if url.scheme() != "https" {
                anyhow::bail!("Cluster server must use https: {}", server);
            }
        }

        if self.cluster.timeout_secs == 0 {
            anyhow::bail!("cluster.timeout_secs must be greater than zero");
        }
        if self.defaults.tail_lines <= 0 {
            anyhow::bail!("defaults.tail_lines must be a positive integer");
        }
        if self.defaults.replicas <= 0 {
            anyhow::bail!("defaults.replicas must be a positive integer");
        }

        for (name, percent) in [
            ("health.node_cpu_percent", self.health.node_cpu_percent),
            ("health.node_memory_percent", self.health.node_memory_percent),
        ] {
            if !(percent > 0.0 && percent <= 100.0) {
                anyhow::bail!("{} must be within (0, 100], got {}", name, percent);
            }
        }
        if self.health.pod_cpu_millicores <= 0.0 || self.health.pod_memory_mib <= 0.0 {
            anyhow::bail!("pod utilization thresholds must be positive");
        }

        Ok(())
    }

    /// Get the bearer token from config or environment
    pub fn get_token(&self) -> anyhow::Result<String> {
        self.cluster
            .token
            .clone()
            .or_else(|| std::env::var(TOKEN_ENV_VAR).ok())
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Cluster token not found. Set {} environment variable or specify cluster.token in config",
                    TOKEN_ENV_VAR
                )
            })
    }

    /// Generate an example configuration file
    pub fn example() -> Self {
        Self {
            cluster: ClusterConnection {
                server: Some("https://api.cluster.example.com:6443".to_string()),
                ..ClusterConnection::default()
            },
            ..Self::default()
        }
    }
}

/// Namespaces are RFC 1123 labels
fn validate_namespace(namespace: &str) -> anyhow::Result<()> {
    if namespace.is_empty() {
        anyhow::bail!("namespace cannot be empty");
    }
    if namespace.len() > 63 {
        anyhow::bail!("namespace must be at most 63 characters: {}", namespace);
    }
    let valid_chars = namespace
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !valid_chars || namespace.starts_with('-') || namespace.ends_with('-') {
        anyhow::bail!("Invalid namespace name: {}", namespace);
    }
    Ok(())
}
