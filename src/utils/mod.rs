/// Shared helpers
pub mod polling;
