//! Observability for the OVN exporter.
//!
//! - [`registry`]: the OVN metric families scraped by Prometheus
//! - [`metrics`]: exporter self-metrics via the `metrics` facade
//! - [`health`]: `/health` and `/ready` probes

pub mod health;
pub mod metrics;
pub mod registry;

pub use health::{health_router, HealthState};
pub use registry::{ErrorTally, GaugeFamily, OvnMetrics};
