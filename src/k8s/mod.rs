/// Kubernetes cluster access for application operations
pub mod client;
pub mod metrics;
pub mod nodes;
pub mod quantity;
pub mod resources;

pub use client::{ClusterApi, ClusterClient};
pub use quantity::QuantityError;
