/// Tool results and how they are rendered for a caller
use serde::Serialize;

use crate::apps::{ApplicationOverview, DeploymentConfig, PodStatus};
use crate::health::HealthReport;
use crate::telemetry::{ContainerUsage, TelemetrySample};

/// How results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Plain text for messages and logs, pretty JSON for structured data
    #[default]
    Text,
    /// Pretty JSON for everything
    Json,
}

/// Result of a dispatched tool call
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ToolOutput {
    Message(String),
    Logs(String),
    Applications(Vec<String>),
    Overview(Vec<ApplicationOverview>),
    Pods(Vec<PodStatus>),
    DeploymentConfig(DeploymentConfig),
    Telemetry(Vec<TelemetrySample>),
    NamespaceMetrics(Vec<ContainerUsage>),
    Health(HealthReport),
}

impl ToolOutput {
    pub fn render(&self, format: OutputFormat) -> String {
        match (self, format) {
            (ToolOutput::Message(text), OutputFormat::Text)
            | (ToolOutput::Logs(text), OutputFormat::Text) => text.clone(),
            (ToolOutput::Applications(names), OutputFormat::Text) if names.is_empty() => {
                "No applications found.".to_string()
            }
            (ToolOutput::Applications(names), OutputFormat::Text) => names
                .iter()
                .map(|name| format!("- {}", name))
                .collect::<Vec<_>>()
                .join("\n"),
            _ => to_pretty_json(self),
        }
    }
}

fn to_pretty_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("Error: failed to serialize result: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthStatus;

    #[test]
    fn test_text_rendering() {
        let message = ToolOutput::Message("Successfully restarted orders.".to_string());
        assert_eq!(message.render(OutputFormat::Text), "Successfully restarted orders.");
        assert_eq!(
            message.render(OutputFormat::Json),
            "\"Successfully restarted orders.\""
        );

        let apps = ToolOutput::Applications(vec!["orders".to_string(), "billing".to_string()]);
        assert_eq!(apps.render(OutputFormat::Text), "- orders\n- billing");
        assert_eq!(
            ToolOutput::Applications(vec![]).render(OutputFormat::Text),
            "No applications found."
        );
    }

    #[test]
    fn test_structured_rendering_is_json() {
        let pods = ToolOutput::Pods(vec![PodStatus {
            name: "orders-1".to_string(),
            status: "Running".to_string(),
        }]);
        let value: serde_json::Value =
            serde_json::from_str(&pods.render(OutputFormat::Text)).unwrap();
        assert_eq!(value[0]["name"], "orders-1");
        assert_eq!(value[0]["status"], "Running");

        let health = ToolOutput::Health(HealthReport::new(
            HealthStatus::Healthy,
            "All nodes are healthy.",
        ));
        let value: serde_json::Value =
            serde_json::from_str(&health.render(OutputFormat::Json)).unwrap();
        assert_eq!(value["status"], "Healthy");
        assert_eq!(value["message"], "All nodes are healthy.");
    }
}
