//! Exporter self-metrics.
//!
//! All metrics follow Prometheus naming conventions:
//! - `ovn_exporter_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! - `collector`: fixed set of collector names
//! - `outcome`/`status`: success, isolated, aborted, error
//!
//! These are separate from the OVN families in [`super::registry`], which
//! describe the monitored cluster rather than the exporter.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder for self-metrics and return its handle.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // A pass runs several commands each bounded by the poll timeout
        .set_buckets_for_metric(
            Matcher::Full("ovn_exporter_poll_pass_duration_seconds".to_string()),
            &[0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0],
        )
        .map_err(|e| format!("Failed to set poll pass buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

/// Record one completed poll pass.
///
/// Metric: `ovn_exporter_poll_passes_total`, `ovn_exporter_poll_pass_duration_seconds`
/// Labels: `outcome` (`complete` or `aborted`)
pub fn record_poll_pass(outcome: &'static str, duration: Duration) {
    counter!("ovn_exporter_poll_passes_total", "outcome" => outcome).increment(1);
    histogram!("ovn_exporter_poll_pass_duration_seconds", "outcome" => outcome)
        .record(duration.as_secs_f64());
}

/// Record one collector run.
///
/// Metric: `ovn_exporter_collector_runs_total`
/// Labels: `collector`, `status` (`success`, `isolated`, `aborted`)
pub fn record_collector_run(collector: &'static str, status: &'static str) {
    counter!(
        "ovn_exporter_collector_runs_total",
        "collector" => collector,
        "status" => status
    )
    .increment(1);
}

/// Record one backend connection attempt.
///
/// Metric: `ovn_exporter_connect_attempts_total`
/// Labels: `status` (`success` or `error`)
pub fn record_connect_attempt(status: &'static str) {
    counter!("ovn_exporter_connect_attempts_total", "status" => status).increment(1);
}
