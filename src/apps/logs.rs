/// Application log retrieval
use futures::future::join_all;
use kube::ResourceExt;
use tracing::{debug, warn};

use crate::k8s::ClusterApi;
use crate::tools::ToolError;

/// Last `tail_lines` lines of every pod of an application, one block per pod.
///
/// A pod whose logs cannot be read gets an error line instead of failing the whole request.
pub async fn application_logs(
    cluster: &dyn ClusterApi,
    app_name: &str,
    tail_lines: i64,
) -> Result<String, ToolError> {
    let pods = cluster
        .list_app_pods(app_name)
        .await
        .map_err(ToolError::cluster("failed to list pods"))?;

    let fetches = pods.iter().map(|pod| async move {
        let name = pod.name_any();
        debug!(pod = %name, tail_lines, "fetching pod logs");
        let logs = cluster
            .pod_logs(&name, tail_lines)
            .await
            .inspect_err(|err| warn!(pod = %name, ?err, "Failed to fetch pod logs"))
            .map_err(|err| err.to_string());
        (name, logs)
    });

    Ok(render_logs(join_all(fetches).await))
}

/// Concatenate per-pod log blocks in pod order
pub fn render_logs(results: Vec<(String, Result<String, String>)>) -> String {
    if results.is_empty() {
        return "No logs available.".to_string();
    }

    results
        .into_iter()
        .map(|(pod, logs)| match logs {
            Ok(text) => format!("\nLogs for {}:\n{}\n", pod, text),
            Err(err) => format!("\nError fetching logs for pod {}: {}\n", pod, err),
        })
        .collect()
}
