/// Tool catalog and the request/argument contract shared by every front end
///
/// A tool request is a single mapping naming the tool in `tool_name` with the tool's
/// arguments alongside it, for example
/// `{"tool_name": "scale_application_pods", "app_name": "orders", "replicas": 3}`.
pub mod args;
pub mod dispatch;
pub mod error;
pub mod output;

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::config::ToolDefaults;

pub use args::ToolArgs;
pub use dispatch::Dispatcher;
pub use error::ToolError;
pub use output::{OutputFormat, ToolOutput};

/// Every action the dispatcher can route to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    GetApplications,
    GetApplicationsOverview,
    GetPodsAndStatusHealthForApplication,
    RestartApplication,
    UpgradeApplication,
    ScaleApplicationPods,
    GetApplicationLogs,
    GetDeploymentConfigs,
    GetApplicationTelemetryData,
    GetNamespaceMetrics,
    CheckCriticalComponentsHealth,
    CheckClusterNodesHealth,
    CheckResourceUtilizationHealth,
    DeployNewApplication,
}

/// One argument accepted by a tool
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ArgSpec {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub required: bool,
    pub description: &'static str,
}

/// Catalog entry describing a tool to a caller
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub arguments: &'static [ArgSpec],
}

const APP_NAME: ArgSpec = ArgSpec {
    name: "app_name",
    kind: "string",
    required: true,
    description: "Application (deployment) name",
};

impl ToolName {
    pub const ALL: [ToolName; 14] = [
        ToolName::GetApplications,
        ToolName::GetApplicationsOverview,
        ToolName::GetPodsAndStatusHealthForApplication,
        ToolName::RestartApplication,
        ToolName::UpgradeApplication,
        ToolName::ScaleApplicationPods,
        ToolName::GetApplicationLogs,
        ToolName::GetDeploymentConfigs,
        ToolName::GetApplicationTelemetryData,
        ToolName::GetNamespaceMetrics,
        ToolName::CheckCriticalComponentsHealth,
        ToolName::CheckClusterNodesHealth,
        ToolName::CheckResourceUtilizationHealth,
        ToolName::DeployNewApplication,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::GetApplications => "get_applications",
            ToolName::GetApplicationsOverview => "get_applications_overview",
            ToolName::GetPodsAndStatusHealthForApplication => {
                "get_pods_and_status_health_for_application"
            }
            ToolName::RestartApplication => "restart_application",
            ToolName::UpgradeApplication => "upgrade_application",
            ToolName::ScaleApplicationPods => "scale_application_pods",
            ToolName::GetApplicationLogs => "get_application_logs",
            ToolName::GetDeploymentConfigs => "get_deployment_configs",
            ToolName::GetApplicationTelemetryData => "get_application_telemetry_data",
            ToolName::GetNamespaceMetrics => "get_namespace_metrics",
            ToolName::CheckCriticalComponentsHealth => "check_critical_components_health",
            ToolName::CheckClusterNodesHealth => "check_cluster_nodes_health",
            ToolName::CheckResourceUtilizationHealth => "check_resource_utilization_health",
            ToolName::DeployNewApplication => "deploy_new_application",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ToolName::GetApplications => "List all application (deployment) names in the namespace.",
            ToolName::GetApplicationsOverview => {
                "Summarize every application: availability, creation date and pod resource usage."
            }
            ToolName::GetPodsAndStatusHealthForApplication => {
                "Get all pods of an application along with each pod's status."
            }
            ToolName::RestartApplication => "Restart an application by rolling its pods.",
            ToolName::UpgradeApplication => "Upgrade an application to a new container image.",
            ToolName::ScaleApplicationPods => "Scale the number of pods of an application.",
            ToolName::GetApplicationLogs => "Fetch recent logs from every pod of an application.",
            ToolName::GetDeploymentConfigs => "Fetch the deployment configuration of an application.",
            ToolName::GetApplicationTelemetryData => {
                "Fetch current CPU and memory usage for every pod of an application."
            }
            ToolName::GetNamespaceMetrics => {
                "Fetch CPU and memory usage of every container in the namespace."
            }
            ToolName::CheckCriticalComponentsHealth => {
                "Check the health of the cluster API server (/healthz)."
            }
            ToolName::CheckClusterNodesHealth => "Report cluster nodes that are not Ready.",
            ToolName::CheckResourceUtilizationHealth => {
                "Report nodes and pods with high CPU or memory utilization."
            }
            ToolName::DeployNewApplication => {
                "Deploy a new application and, when a port is given, expose it with a service."
            }
        }
    }

    pub fn arguments(self) -> &'static [ArgSpec] {
        match self {
            ToolName::GetApplications
            | ToolName::GetApplicationsOverview
            | ToolName::GetNamespaceMetrics
            | ToolName::CheckCriticalComponentsHealth
            | ToolName::CheckClusterNodesHealth
            | ToolName::CheckResourceUtilizationHealth => &[],
            ToolName::GetPodsAndStatusHealthForApplication
            | ToolName::RestartApplication
            | ToolName::GetDeploymentConfigs
            | ToolName::GetApplicationTelemetryData => &[APP_NAME],
            ToolName::UpgradeApplication => &[
                APP_NAME,
                ArgSpec {
                    name: "new_image",
                    kind: "string",
                    required: true,
                    description: "Container image to roll out",
                },
            ],
            ToolName::ScaleApplicationPods => &[
                APP_NAME,
                ArgSpec {
                    name: "replicas",
                    kind: "integer",
                    required: false,
                    description: "Desired number of pods (default 1)",
                },
            ],
            ToolName::GetApplicationLogs => &[
                APP_NAME,
                ArgSpec {
                    name: "tail_lines",
                    kind: "integer",
                    required: false,
                    description: "Number of most recent lines per pod (default 100)",
                },
            ],
            ToolName::DeployNewApplication => &[
                APP_NAME,
                ArgSpec {
                    name: "container_image",
                    kind: "string",
                    required: true,
                    description: "Container image to run",
                },
                ArgSpec {
                    name: "replicas",
                    kind: "integer",
                    required: false,
                    description: "Number of pods (default 1)",
                },
                ArgSpec {
                    name: "port",
                    kind: "integer",
                    required: false,
                    description: "Port to expose through a ClusterIP service (default 8080, null for none)",
                },
            ],
        }
    }

    pub fn spec(self) -> ToolSpec {
        ToolSpec {
            name: self.as_str(),
            description: self.description(),
            arguments: self.arguments(),
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        ToolName::ALL
            .into_iter()
            .find(|tool| tool.as_str() == name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }
}

/// The full tool catalog
pub fn catalog() -> Vec<ToolSpec> {
    ToolName::ALL.into_iter().map(ToolName::spec).collect()
}

/// A validated tool request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    GetApplications,
    GetApplicationsOverview,
    GetPods {
        app_name: String,
    },
    Restart {
        app_name: String,
    },
    Upgrade {
        app_name: String,
        new_image: String,
    },
    Scale {
        app_name: String,
        replicas: i32,
    },
    Logs {
        app_name: String,
        tail_lines: i64,
    },
    DeploymentConfigs {
        app_name: String,
    },
    Telemetry {
        app_name: String,
    },
    NamespaceMetrics,
    CriticalComponentsHealth,
    NodesHealth,
    ResourceUtilizationHealth,
    Deploy {
        app_name: String,
        container_image: String,
        replicas: i32,
        port: Option<u16>,
    },
}

impl ToolCall {
    /// Parse a raw tool request.
    ///
    /// JSON is expected; YAML flow mappings (`{'tool_name': 'get_applications'}`) are also
    /// accepted since model output often uses single quotes, along with the `None`, `True`
    /// and `False` literals that come with that style.
    pub fn parse(raw: &str, defaults: &ToolDefaults) -> Result<Self, ToolError> {
        let raw = raw.trim();
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(json_err) => serde_yaml::from_str(&yaml_literals(raw))
                .map_err(|_| ToolError::Malformed(json_err.to_string()))?,
        };
        Self::from_value(value, defaults)
    }

    /// Build a call from a decoded request object
    pub fn from_value(value: Value, defaults: &ToolDefaults) -> Result<Self, ToolError> {
        let Value::Object(mut map) = value else {
            return Err(ToolError::NotAnObject);
        };
        let name = match map.remove("tool_name") {
            Some(Value::String(name)) => name.parse::<ToolName>()?,
            Some(other) => return Err(ToolError::UnknownTool(other.to_string())),
            None => return Err(ToolError::UnknownTool(Value::Null.to_string())),
        };
        Self::from_args(name, &ToolArgs::new(map), defaults)
    }

    /// Validate the arguments of a named tool
    pub fn from_args(
        name: ToolName,
        args: &ToolArgs,
        defaults: &ToolDefaults,
    ) -> Result<Self, ToolError> {
        let call = match name {
            ToolName::GetApplications => ToolCall::GetApplications,
            ToolName::GetApplicationsOverview => ToolCall::GetApplicationsOverview,
            ToolName::GetPodsAndStatusHealthForApplication => ToolCall::GetPods {
                app_name: args.required_str("app_name")?,
            },
            ToolName::RestartApplication => ToolCall::Restart {
                app_name: args.required_str("app_name")?,
            },
            ToolName::UpgradeApplication => ToolCall::Upgrade {
                app_name: args.required_str("app_name")?,
                new_image: args.required_str("new_image")?,
            },
            ToolName::ScaleApplicationPods => ToolCall::Scale {
                app_name: args.required_str("app_name")?,
                replicas: args.replicas(defaults.replicas, true)?,
            },
            ToolName::GetApplicationLogs => ToolCall::Logs {
                app_name: args.required_str("app_name")?,
                tail_lines: args.positive_int("tail_lines", defaults.tail_lines)?,
            },
            ToolName::GetDeploymentConfigs => ToolCall::DeploymentConfigs {
                app_name: args.required_str("app_name")?,
            },
            ToolName::GetApplicationTelemetryData => ToolCall::Telemetry {
                app_name: args.required_str("app_name")?,
            },
            ToolName::GetNamespaceMetrics => ToolCall::NamespaceMetrics,
            ToolName::CheckCriticalComponentsHealth => ToolCall::CriticalComponentsHealth,
            ToolName::CheckClusterNodesHealth => ToolCall::NodesHealth,
            ToolName::CheckResourceUtilizationHealth => ToolCall::ResourceUtilizationHealth,
            ToolName::DeployNewApplication => ToolCall::Deploy {
                app_name: args.required_str("app_name")?,
                container_image: args.required_str("container_image")?,
                replicas: args.replicas(defaults.replicas, false)?,
                port: args.optional_port("port", defaults.port)?,
            },
        };
        Ok(call)
    }

    pub fn name(&self) -> ToolName {
        match self {
            ToolCall::GetApplications => ToolName::GetApplications,
            ToolCall::GetApplicationsOverview => ToolName::GetApplicationsOverview,
            ToolCall::GetPods { .. } => ToolName::GetPodsAndStatusHealthForApplication,
            ToolCall::Restart { .. } => ToolName::RestartApplication,
            ToolCall::Upgrade { .. } => ToolName::UpgradeApplication,
            ToolCall::Scale { .. } => ToolName::ScaleApplicationPods,
            ToolCall::Logs { .. } => ToolName::GetApplicationLogs,
            ToolCall::DeploymentConfigs { .. } => ToolName::GetDeploymentConfigs,
            ToolCall::Telemetry { .. } => ToolName::GetApplicationTelemetryData,
            ToolCall::NamespaceMetrics => ToolName::GetNamespaceMetrics,
            ToolCall::CriticalComponentsHealth => ToolName::CheckCriticalComponentsHealth,
            ToolCall::NodesHealth => ToolName::CheckClusterNodesHealth,
            ToolCall::ResourceUtilizationHealth => ToolName::CheckResourceUtilizationHealth,
            ToolCall::Deploy { .. } => ToolName::DeployNewApplication,
        }
    }

    /// The application a call targets, if any
    pub fn app_name(&self) -> Option<&str> {
        match self {
            ToolCall::GetPods { app_name }
            | ToolCall::Restart { app_name }
            | ToolCall::Upgrade { app_name, .. }
            | ToolCall::Scale { app_name, .. }
            | ToolCall::Logs { app_name, .. }
            | ToolCall::DeploymentConfigs { app_name }
            | ToolCall::Telemetry { app_name }
            | ToolCall::Deploy { app_name, .. } => Some(app_name),
            _ => None,
        }
    }
}


/// Rewrite the unquoted `None`, `True` and `False` literals of a flow mapping as YAML ones
fn yaml_literals(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut word = String::new();

    let flush = |word: &mut String, out: &mut String| {
        out.push_str(match word.as_str() {
            "None" => "null",
            "True" => "true",
            "False" => "false",
            other => other,
        });
        word.clear();
    };

    for c in raw.chars() {
        if let Some(q) = quote {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' && q == '"' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
            word.push(c);
            continue;
        }
        flush(&mut word, &mut out);
        if c == '\'' || c == '"' {
            quote = Some(c);
        }
        out.push(c);
    }
    flush(&mut word, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<ToolCall, ToolError> {
        ToolCall::parse(raw, &ToolDefaults::default())
    }

    #[test]
    fn test_tool_names_round_trip() {
        for tool in ToolName::ALL {
            assert_eq!(tool.as_str().parse::<ToolName>().unwrap(), tool);
            assert_eq!(tool.to_string(), tool.as_str());
        }
    }

    #[test]
    fn test_catalog_covers_every_tool() {
        let catalog = catalog();
        assert_eq!(catalog.len(), ToolName::ALL.len());
        let deploy = catalog
            .iter()
            .find(|spec| spec.name == "deploy_new_application")
            .unwrap();
        let required: Vec<_> = deploy
            .arguments
            .iter()
            .filter(|arg| arg.required)
            .map(|arg| arg.name)
            .collect();
        assert_eq!(required, vec!["app_name", "container_image"]);
    }

    #[test]
    fn test_parse_json_request() {
        let call = parse(r#"{"tool_name": "scale_application_pods", "app_name": "orders", "replicas": 3}"#)
            .unwrap();
        assert_eq!(
            call,
            ToolCall::Scale {
                app_name: "orders".to_string(),
                replicas: 3
            }
        );
        assert_eq!(call.name(), ToolName::ScaleApplicationPods);
        assert_eq!(call.app_name(), Some("orders"));
    }

    #[test]
    fn test_parse_single_quoted_request() {
        let call = parse("{'tool_name': 'get_application_logs', 'app_name': 'orders', 'tail_lines': 20}")
            .unwrap();
        assert_eq!(
            call,
            ToolCall::Logs {
                app_name: "orders".to_string(),
                tail_lines: 20
            }
        );
    }

    #[test]
    fn test_parse_single_quoted_literals() {
        let call = parse(
            "{'tool_name': 'deploy_new_application', 'app_name': 'web', \
             'container_image': 'nginx', 'port': None}",
        )
        .unwrap();
        assert_eq!(
            call,
            ToolCall::Deploy {
                app_name: "web".to_string(),
                container_image: "nginx".to_string(),
                replicas: 1,
                port: None,
            }
        );

        assert!(matches!(
            parse("{'tool_name': 'scale_application_pods', 'app_name': 'web', 'replicas': True}"),
            Err(ToolError::InvalidArgument { name: "replicas", .. })
        ));
    }

    #[test]
    fn test_literals_inside_quotes_are_kept() {
        assert_eq!(
            yaml_literals("{'app_name': 'None', 'x': True, \"y\": \"a \\\" False\", z: Nonesuch}"),
            "{'app_name': 'None', 'x': true, \"y\": \"a \\\" False\", z: Nonesuch}"
        );
    }

    #[test]
    fn test_defaults_are_applied() {
        assert_eq!(
            parse(r#"{"tool_name": "get_application_logs", "app_name": "orders"}"#).unwrap(),
            ToolCall::Logs {
                app_name: "orders".to_string(),
                tail_lines: 100
            }
        );
        assert_eq!(
            parse(r#"{"tool_name": "deploy_new_application", "app_name": "web", "container_image": "nginx"}"#)
                .unwrap(),
            ToolCall::Deploy {
                app_name: "web".to_string(),
                container_image: "nginx".to_string(),
                replicas: 1,
                port: Some(8080),
            }
        );
    }

    #[test]
    fn test_tools_without_arguments_ignore_extras() {
        assert_eq!(
            parse(r#"{"tool_name": "get_applications", "app_name": "ignored"}"#).unwrap(),
            ToolCall::GetApplications
        );
        assert_eq!(
            parse(r#"{"tool_name": "check_cluster_nodes_health"}"#).unwrap(),
            ToolCall::NodesHealth
        );
    }

    #[test]
    fn test_request_shape_errors() {
        assert!(matches!(parse("[1, 2]"), Err(ToolError::NotAnObject)));
        assert!(matches!(parse("\"get_applications\""), Err(ToolError::NotAnObject)));
        assert!(matches!(
            parse("{}"),
            Err(ToolError::UnknownTool(name)) if name == "null"
        ));
        assert_eq!(
            parse("{'app_name': 'orders'}").unwrap_err().to_string(),
            "unknown tool 'null'"
        );
        assert!(matches!(
            parse(r#"{"tool_name": "drop_database"}"#),
            Err(ToolError::UnknownTool(name)) if name == "drop_database"
        ));
        assert!(matches!(parse("{not valid"), Err(ToolError::Malformed(_))));
    }

    #[test]
    fn test_argument_errors() {
        assert!(matches!(
            parse(r#"{"tool_name": "restart_application"}"#),
            Err(ToolError::MissingArgument("app_name"))
        ));
        assert!(matches!(
            parse(r#"{"tool_name": "upgrade_application", "app_name": "orders"}"#),
            Err(ToolError::MissingArgument("new_image"))
        ));
        assert!(matches!(
            parse(r#"{"tool_name": "get_application_logs", "app_name": "orders", "tail_lines": 0}"#),
            Err(ToolError::InvalidArgument { name: "tail_lines", .. })
        ));
        assert!(matches!(
            parse(r#"{"tool_name": "deploy_new_application", "app_name": "web", "container_image": "nginx", "replicas": 0}"#),
            Err(ToolError::InvalidArgument { name: "replicas", .. })
        ));
    }

    #[test]
    fn test_scale_to_zero_is_allowed() {
        assert_eq!(
            parse(r#"{"tool_name": "scale_application_pods", "app_name": "orders", "replicas": 0}"#)
                .unwrap(),
            ToolCall::Scale {
                app_name: "orders".to_string(),
                replicas: 0
            }
        );
    }
}
