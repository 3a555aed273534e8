//! System-level services: metrics and numeric helpers

/// Prometheus counters of a store
pub mod metrics;
/// gcd and shuffle strides
pub mod utils;

pub use metrics::{Anomalies, StoreMetrics};
pub use utils::{gcd, relprime};
