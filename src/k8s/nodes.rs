/// Node readiness and capacity helpers
use k8s_openapi::api::core::v1::{Node, NodeCondition};

use super::quantity::{self, QuantityError};

/// The `Ready` condition of a node, if it reports one
pub fn ready_condition(node: &Node) -> Option<&NodeCondition> {
    node.status
        .as_ref()?
        .conditions
        .as_ref()?
        .iter()
        .find(|condition| condition.type_ == "Ready")
}

/// Whether the node reports `Ready=True`
pub fn is_ready(node: &Node) -> bool {
    ready_condition(node).is_some_and(|condition| condition.status == "True")
}

/// Allocatable CPU (millicores) and memory (bytes), when the node reports them
pub fn allocatable(node: &Node) -> Result<Option<(f64, f64)>, QuantityError> {
    let Some(allocatable) = node.status.as_ref().and_then(|s| s.allocatable.as_ref()) else {
        return Ok(None);
    };
    let (Some(cpu), Some(memory)) = (allocatable.get("cpu"), allocatable.get("memory")) else {
        return Ok(None);
    };
    Ok(Some((
        quantity::cpu_millicores(&cpu.0)?,
        quantity::memory_bytes(&memory.0)?,
    )))
}
