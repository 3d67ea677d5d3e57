/// Mutating application handlers: restart, scale, upgrade, deploy
use anyhow::Result;
use chrono::Utc;
use k8s_openapi::api::apps::v1::Deployment;
use tracing::info;

use crate::k8s::resources;
use crate::k8s::ClusterApi;
use crate::tools::ToolError;
use crate::utils::polling::Poller;

/// Roll every pod of an application by stamping the restart annotation
pub async fn restart(cluster: &dyn ClusterApi, app_name: &str) -> Result<String, ToolError> {
    info!("Restarting application: {}", app_name);

    let patch = resources::restart_patch(&Utc::now().to_rfc3339());
    cluster
        .merge_patch_deployment(app_name, patch)
        .await
        .map_err(ToolError::cluster("failed to restart application"))?;

    Ok(format!("Successfully restarted {}.", app_name))
}

/// Set the replica count of an application
pub async fn scale(
    cluster: &dyn ClusterApi,
    app_name: &str,
    replicas: i32,
) -> Result<String, ToolError> {
    info!("Scaling application {} to {} replicas", app_name, replicas);

    cluster
        .merge_patch_deployment(app_name, resources::scale_patch(replicas))
        .await
        .map_err(ToolError::cluster("failed to scale pods"))?;

    Ok(format!("Successfully scaled {} to {} pods.", app_name, replicas))
}

/// Point every container of an application at a new image
pub async fn upgrade(
    cluster: &dyn ClusterApi,
    app_name: &str,
    new_image: &str,
) -> Result<String, ToolError> {
    info!("Upgrading application {} to image {}", app_name, new_image);

    let deployment = cluster
        .get_deployment(app_name)
        .await
        .map_err(ToolError::cluster("failed to upgrade application"))?;

    let containers = resources::container_names(&deployment);
    if containers.is_empty() {
        return Err(ToolError::NoContainers(app_name.to_string()));
    }

    let patch = resources::image_patch(containers, new_image);
    cluster
        .strategic_patch_deployment(app_name, patch)
        .await
        .map_err(ToolError::cluster("failed to upgrade application"))?;

    Ok(format!(
        "Successfully upgraded {} to image {}.",
        app_name, new_image
    ))
}

/// Create a deployment and, when a port is given, a ClusterIP service in front of it
pub async fn deploy(
    cluster: &dyn ClusterApi,
    app_name: &str,
    container_image: &str,
    replicas: i32,
    port: Option<u16>,
) -> Result<String, ToolError> {
    info!(
        "Deploying application {} ({}) with {} replicas",
        app_name, container_image, replicas
    );

    let deployment = resources::deployment(app_name, container_image, replicas, port);
    cluster
        .create_deployment(deployment)
        .await
        .map_err(ToolError::cluster("failed to deploy application"))?;

    if let Some(port) = port {
        info!("Exposing {} on port {}", app_name, port);
        cluster
            .create_service(resources::service(app_name, port))
            .await
            .map_err(ToolError::cluster("failed to create service"))?;
    }

    Ok(format!(
        "Successfully deployed application '{}' with {} replicas.",
        app_name, replicas
    ))
}

/// Whether the latest spec of a deployment has been fully rolled out
pub fn rollout_complete(deployment: &Deployment) -> bool {
    let (Some(spec), Some(status)) = (deployment.spec.as_ref(), deployment.status.as_ref()) else {
        return false;
    };

    let desired = spec.replicas.unwrap_or(1);
    let observed = match (deployment.metadata.generation, status.observed_generation) {
        (Some(generation), Some(observed)) => observed >= generation,
        (None, _) => true,
        (Some(_), None) => false,
    };

    observed
        && status.updated_replicas.unwrap_or(0) == desired
        && status.available_replicas.unwrap_or(0) == desired
        && status.replicas.unwrap_or(0) == desired
}

/// Wait until an application's rollout completes
pub async fn wait_for_rollout(
    cluster: &dyn ClusterApi,
    app_name: &str,
    timeout_secs: u64,
) -> Result<()> {
    Poller::new(timeout_secs, 2, format!("Waiting for rollout of {}", app_name))
        .until(|| async move {
            let deployment = cluster.get_deployment(app_name).await?;
            Ok(rollout_complete(&deployment))
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::client::tests::unreachable;
    use crate::k8s::client::MockClusterApi;
    use k8s_openapi::api::apps::v1::DeploymentStatus;
    use serde_json::json;

    fn rolled(generation: i64, observed: i64, updated: i32, available: i32, total: i32) -> Deployment {
        let mut deployment = resources::deployment("orders", "img", 3, None);
        deployment.metadata.generation = Some(generation);
        deployment.status = Some(DeploymentStatus {
            observed_generation: Some(observed),
            updated_replicas: Some(updated),
            available_replicas: Some(available),
            replicas: Some(total),
            ..Default::default()
        });
        deployment
    }

    #[test]
    fn test_rollout_complete() {
        assert!(rollout_complete(&rolled(2, 2, 3, 3, 3)));
    }

    #[test]
    fn test_rollout_in_progress() {
        // controller has not seen the new spec yet
        assert!(!rollout_complete(&rolled(3, 2, 3, 3, 3)));
        // old pods still terminating
        assert!(!rollout_complete(&rolled(2, 2, 3, 3, 4)));
        assert!(!rollout_complete(&rolled(2, 2, 1, 3, 3)));
        assert!(!rollout_complete(&rolled(2, 2, 3, 2, 3)));
        assert!(!rollout_complete(&resources::deployment("orders", "img", 1, None)));
    }

    #[test]
    fn test_scaled_to_zero_is_complete() {
        let mut deployment = resources::deployment("orders", "img", 0, None);
        deployment.status = Some(DeploymentStatus::default());
        assert!(rollout_complete(&deployment));
    }

    #[tokio::test]
    async fn test_restart_stamps_annotation() {
        let mut cluster = MockClusterApi::new();
        cluster
            .expect_merge_patch_deployment()
            .withf(|name, patch| {
                name == "orders"
                    && patch["spec"]["template"]["metadata"]["annotations"]
                        [resources::RESTARTED_AT_ANNOTATION]
                        .is_string()
            })
            .times(1)
            .returning(|_, _| Ok(resources::deployment("orders", "img", 1, None)));

        let message = restart(&cluster, "orders").await.unwrap();
        assert_eq!(message, "Successfully restarted orders.");
    }

    #[tokio::test]
    async fn test_scale_patches_replicas() {
        let mut cluster = MockClusterApi::new();
        cluster
            .expect_merge_patch_deployment()
            .withf(|name, patch| name == "orders" && *patch == json!({ "spec": { "replicas": 0 } }))
            .times(1)
            .returning(|_, _| Ok(resources::deployment("orders", "img", 0, None)));

        let message = scale(&cluster, "orders", 0).await.unwrap();
        assert_eq!(message, "Successfully scaled orders to 0 pods.");
    }

    #[tokio::test]
    async fn test_scale_failure_names_the_action() {
        let mut cluster = MockClusterApi::new();
        cluster
            .expect_merge_patch_deployment()
            .returning(|_, _| Err(unreachable()));

        let err = scale(&cluster, "orders", 2).await.unwrap_err();
        assert!(matches!(
            err,
            ToolError::Cluster {
                action: "failed to scale pods",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_upgrade_sets_every_container_image() {
        let mut cluster = MockClusterApi::new();
        cluster
            .expect_get_deployment()
            .withf(|name| name == "orders")
            .returning(|_| Ok(resources::deployment("orders", "orders:1", 2, None)));
        cluster
            .expect_strategic_patch_deployment()
            .withf(|name, patch| name == "orders" && *patch == resources::image_patch(["orders"], "orders:2"))
            .times(1)
            .returning(|_, _| Ok(resources::deployment("orders", "orders:2", 2, None)));

        let message = upgrade(&cluster, "orders", "orders:2").await.unwrap();
        assert_eq!(message, "Successfully upgraded orders to image orders:2.");
    }

    #[tokio::test]
    async fn test_upgrade_without_containers() {
        let mut cluster = MockClusterApi::new();
        cluster.expect_get_deployment().returning(|_| {
            let mut deployment = resources::deployment("orders", "img", 1, None);
            if let Some(pod) = deployment
                .spec
                .as_mut()
                .and_then(|spec| spec.template.spec.as_mut())
            {
                pod.containers.clear();
            }
            Ok(deployment)
        });
        cluster.expect_strategic_patch_deployment().never();

        let err = upgrade(&cluster, "orders", "img:2").await.unwrap_err();
        assert!(matches!(err, ToolError::NoContainers(name) if name == "orders"));
    }

    #[tokio::test]
    async fn test_deploy_with_port_creates_service() {
        let mut cluster = MockClusterApi::new();
        cluster
            .expect_create_deployment()
            .withf(|deployment| {
                deployment.metadata.name.as_deref() == Some("orders")
                    && deployment.spec.as_ref().and_then(|spec| spec.replicas) == Some(2)
            })
            .times(1)
            .returning(Ok);
        cluster
            .expect_create_service()
            .withf(|service| {
                let ports = service.spec.as_ref().and_then(|spec| spec.ports.clone());
                ports.is_some_and(|ports| ports[0].port == 9090)
            })
            .times(1)
            .returning(Ok);

        let message = deploy(&cluster, "orders", "orders:1", 2, Some(9090))
            .await
            .unwrap();
        assert_eq!(
            message,
            "Successfully deployed application 'orders' with 2 replicas."
        );
    }

    #[tokio::test]
    async fn test_deploy_without_port_skips_service() {
        let mut cluster = MockClusterApi::new();
        cluster.expect_create_deployment().times(1).returning(Ok);
        cluster.expect_create_service().never();

        assert!(deploy(&cluster, "worker", "busybox", 1, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_deploy_reports_service_failure() {
        let mut cluster = MockClusterApi::new();
        cluster.expect_create_deployment().returning(Ok);
        cluster
            .expect_create_service()
            .returning(|_| Err(unreachable()));

        let err = deploy(&cluster, "orders", "orders:1", 1, Some(8080))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("failed to create service:"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_rollout_polls_until_complete() {
        let mut cluster = MockClusterApi::new();
        let mut calls = 0;
        cluster.expect_get_deployment().times(2).returning(move |_| {
            calls += 1;
            Ok(if calls == 1 {
                rolled(2, 1, 3, 3, 3)
            } else {
                rolled(2, 2, 3, 3, 3)
            })
        });

        assert!(wait_for_rollout(&cluster, "orders", 30).await.is_ok());
    }
}
