/// Routes a validated tool call to exactly one handler
use std::sync::Arc;

use tracing::{info, warn};

use super::{OutputFormat, ToolCall, ToolError, ToolOutput};
use crate::apps::{self, lifecycle, logs};
use crate::config::AssistantConfig;
use crate::health;
use crate::k8s::ClusterApi;
use crate::telemetry;

/// Tool dispatcher bound to one cluster namespace
pub struct Dispatcher {
    cluster: Arc<dyn ClusterApi>,
    config: AssistantConfig,
}

impl Dispatcher {
    pub fn new(cluster: Arc<dyn ClusterApi>, config: AssistantConfig) -> Self {
        Self { cluster, config }
    }

    pub fn cluster(&self) -> &dyn ClusterApi {
        self.cluster.as_ref()
    }

    /// Run one tool call
    pub async fn dispatch(&self, call: ToolCall) -> Result<ToolOutput, ToolError> {
        info!(
            tool = %call.name(),
            app = call.app_name().unwrap_or("-"),
            namespace = %self.config.namespace,
            "Dispatching tool call"
        );

        let cluster = self.cluster.as_ref();
        let output = match call {
            ToolCall::GetApplications => {
                ToolOutput::Applications(apps::list_applications(cluster).await?)
            }
            ToolCall::GetApplicationsOverview => {
                ToolOutput::Overview(apps::applications_overview(cluster).await?)
            }
            ToolCall::GetPods { app_name } => {
                ToolOutput::Pods(apps::pod_statuses(cluster, &app_name).await?)
            }
            ToolCall::DeploymentConfigs { app_name } => {
                ToolOutput::DeploymentConfig(apps::deployment_config(cluster, &app_name).await?)
            }
            ToolCall::Restart { app_name } => {
                ToolOutput::Message(lifecycle::restart(cluster, &app_name).await?)
            }
            ToolCall::Scale { app_name, replicas } => {
                ToolOutput::Message(lifecycle::scale(cluster, &app_name, replicas).await?)
            }
            ToolCall::Upgrade {
                app_name,
                new_image,
            } => ToolOutput::Message(lifecycle::upgrade(cluster, &app_name, &new_image).await?),
            ToolCall::Deploy {
                app_name,
                container_image,
                replicas,
                port,
            } => ToolOutput::Message(
                lifecycle::deploy(cluster, &app_name, &container_image, replicas, port).await?,
            ),
            ToolCall::Logs {
                app_name,
                tail_lines,
            } => ToolOutput::Logs(logs::application_logs(cluster, &app_name, tail_lines).await?),
            ToolCall::Telemetry { app_name } => {
                ToolOutput::Telemetry(telemetry::application_telemetry(cluster, &app_name).await?)
            }
            ToolCall::NamespaceMetrics => {
                ToolOutput::NamespaceMetrics(telemetry::namespace_metrics(cluster).await?)
            }
            ToolCall::CriticalComponentsHealth => {
                ToolOutput::Health(health::critical_components(cluster).await)
            }
            ToolCall::NodesHealth => ToolOutput::Health(health::cluster_nodes(cluster).await),
            ToolCall::ResourceUtilizationHealth => ToolOutput::Health(
                health::resource_utilization(cluster, &self.config.health).await,
            ),
        };

        Ok(output)
    }

    /// The string contract shared by every front end: parse, dispatch and render.
    ///
    /// Failures are rendered as `Error: <message>` rather than returned.
    pub async fn handle(&self, raw: &str, format: OutputFormat) -> String {
        let result = match ToolCall::parse(raw, &self.config.defaults) {
            Ok(call) => self.dispatch(call).await,
            Err(err) => Err(err),
        };
        render_result(result, format)
    }
}

/// Render a dispatch result, turning failures into an error line
pub fn render_result(result: Result<ToolOutput, ToolError>, format: OutputFormat) -> String {
    match result {
        Ok(output) => output.render(format),
        Err(err) => {
            warn!(%err, "Tool call failed");
            match format {
                OutputFormat::Text => format!("Error: {}", err),
                OutputFormat::Json => serde_json::json!({ "error": err.to_string() }).to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps::tests::pod;
    use crate::health::HealthStatus;
    use crate::k8s::client::tests::unreachable;
    use crate::k8s::client::MockClusterApi;
    use crate::k8s::resources;

    fn dispatcher(cluster: MockClusterApi) -> Dispatcher {
        Dispatcher::new(Arc::new(cluster), AssistantConfig::default())
    }

    #[test]
    fn test_render_error_text() {
        let rendered = render_result(
            Err(ToolError::MissingArgument("app_name")),
            OutputFormat::Text,
        );
        assert_eq!(
            rendered,
            "Error: 'app_name' is required and must be a non-empty string."
        );
    }

    #[test]
    fn test_render_error_json() {
        let rendered = render_result(Err(ToolError::NotAnObject), OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["error"], "'input' must be a dictionary.");
    }

    #[test]
    fn test_render_success() {
        let rendered = render_result(
            Ok(ToolOutput::Message("Successfully scaled orders to 3 pods.".to_string())),
            OutputFormat::Text,
        );
        assert_eq!(rendered, "Successfully scaled orders to 3 pods.");
    }

    #[tokio::test]
    async fn test_handle_renders_cluster_failure() {
        let mut cluster = MockClusterApi::new();
        cluster
            .expect_list_deployments()
            .returning(|| Err(unreachable()));

        let rendered = dispatcher(cluster)
            .handle(r#"{"tool_name": "get_applications"}"#, OutputFormat::Text)
            .await;
        assert!(rendered.starts_with("Error: failed to list applications:"));
        assert!(rendered.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_handle_rejects_bad_request_without_cluster_calls() {
        // any cluster call would panic on the mock
        let dispatcher = dispatcher(MockClusterApi::new());

        assert_eq!(
            dispatcher.handle("[1, 2]", OutputFormat::Text).await,
            "Error: 'input' must be a dictionary."
        );
        assert_eq!(
            dispatcher
                .handle(
                    "{'tool_name': 'get_pods_and_status_health_for_application'}",
                    OutputFormat::Text
                )
                .await,
            "Error: 'app_name' is required and must be a non-empty string."
        );
    }

    #[tokio::test]
    async fn test_handle_lists_applications() {
        let mut cluster = MockClusterApi::new();
        cluster.expect_list_deployments().returning(|| {
            Ok(vec![
                resources::deployment("orders", "img", 1, None),
                resources::deployment("billing", "img", 1, None),
            ])
        });

        let rendered = dispatcher(cluster)
            .handle("{'tool_name': 'get_applications'}", OutputFormat::Text)
            .await;
        assert_eq!(rendered, "- orders\n- billing");
    }

    #[tokio::test]
    async fn test_dispatch_routes_to_handlers() {
        let mut cluster = MockClusterApi::new();
        cluster
            .expect_list_app_pods()
            .withf(|app| app == "orders")
            .times(1)
            .returning(|_| Ok(vec![pod("orders-1", "orders", Some("Running"))]));
        cluster
            .expect_merge_patch_deployment()
            .withf(|name, _| name == "orders")
            .times(1)
            .returning(|_, _| Ok(resources::deployment("orders", "img", 4, None)));
        cluster.expect_list_nodes().times(1).returning(|| Ok(vec![]));
        let dispatcher = dispatcher(cluster);

        let pods = dispatcher
            .dispatch(ToolCall::GetPods {
                app_name: "orders".to_string(),
            })
            .await
            .unwrap();
        assert!(matches!(pods, ToolOutput::Pods(ref pods) if pods[0].name == "orders-1"));

        let scaled = dispatcher
            .dispatch(ToolCall::Scale {
                app_name: "orders".to_string(),
                replicas: 4,
            })
            .await
            .unwrap();
        assert_eq!(
            scaled.render(OutputFormat::Text),
            "Successfully scaled orders to 4 pods."
        );

        let health = dispatcher.dispatch(ToolCall::NodesHealth).await.unwrap();
        assert!(matches!(health, ToolOutput::Health(ref report) if report.status == HealthStatus::Healthy));
    }
}
