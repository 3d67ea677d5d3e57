/// Deployment and Service manifests and the patches applied to deployments
use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde_json::{json, Value};

/// Pod template annotation that forces a rollout when changed
pub const RESTARTED_AT_ANNOTATION: &str = "kubectl.kubernetes.io/restartedAt";

fn app_labels(app_name: &str) -> BTreeMap<String, String> {
    [("app".to_string(), app_name.to_string())].into_iter().collect()
}

/// A single-container Deployment selecting pods by `app=<name>`
pub fn deployment(app_name: &str, image: &str, replicas: i32, port: Option<u16>) -> Deployment {
    let ports = port.map(|port| {
        vec![ContainerPort {
            container_port: i32::from(port),
            ..Default::default()
        }]
    });

    Deployment {
        metadata: ObjectMeta {
            name: Some(app_name.to_string()),
            labels: Some(app_labels(app_name)),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(replicas),
            selector: LabelSelector {
                match_labels: Some(app_labels(app_name)),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(app_labels(app_name)),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: app_name.to_string(),
                        image: Some(image.to_string()),
                        ports,
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// A ClusterIP Service exposing `port` on the application's pods
pub fn service(app_name: &str, port: u16) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(app_name.to_string()),
            labels: Some(app_labels(app_name)),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(app_labels(app_name)),
            ports: Some(vec![ServicePort {
                port: i32::from(port),
                target_port: Some(IntOrString::Int(i32::from(port))),
                ..Default::default()
            }]),
            type_: Some("ClusterIP".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Merge patch stamping the restart annotation on the pod template
pub fn restart_patch(restarted_at: &str) -> Value {
    let mut annotations = serde_json::Map::new();
    annotations.insert(
        RESTARTED_AT_ANNOTATION.to_string(),
        Value::from(restarted_at),
    );
    json!({ "spec": { "template": { "metadata": { "annotations": annotations } } } })
}

/// Merge patch setting the replica count
pub fn scale_patch(replicas: i32) -> Value {
    json!({ "spec": { "replicas": replicas } })
}

/// Strategic merge patch setting the image of each named container
pub fn image_patch<'a>(containers: impl IntoIterator<Item = &'a str>, image: &str) -> Value {
    let containers: Vec<Value> = containers
        .into_iter()
        .map(|name| json!({ "name": name, "image": image }))
        .collect();
    json!({ "spec": { "template": { "spec": { "containers": containers } } } })
}

/// Names of the containers in a deployment's pod template
pub fn container_names(deployment: &Deployment) -> Vec<&str> {
    deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.template.spec.as_ref())
        .map(|pod| pod.containers.iter().map(|c| c.name.as_str()).collect())
        .unwrap_or_default()
}
