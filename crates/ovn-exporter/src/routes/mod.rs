//! HTTP routes for the OVN exporter.
//!
//! Defines the Axum router and application state.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::error;

use crate::config::Config;
use crate::observability::{health_router, HealthState, OvnMetrics};

/// Content type of the Prometheus text exposition format.
pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// OVN families filled by the poller.
    pub metrics: Arc<OvnMetrics>,

    /// Exporter self-metrics; `None` when no recorder is installed.
    pub self_metrics: Option<PrometheusHandle>,

    /// Liveness/readiness flags.
    pub health: Arc<HealthState>,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `<metrics_path>` - OVN families followed by self-metrics (when enabled)
/// - `/health`, `/ready` - probes
/// - TraceLayer for request logging
/// - 30 second request timeout
pub fn build_routes(config: &Config, state: AppState) -> Router {
    let mut app = health_router(Arc::clone(&state.health));

    if config.enable_metrics {
        let metrics_routes = Router::new()
            .route(&config.metrics_path, get(metrics_handler))
            .with_state(state);
        app = app.merge(metrics_routes);
    }

    app.layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    let mut body = match state.metrics.render() {
        Ok(text) => text,
        Err(e) => {
            error!(target: "ovn.collector", error = %e, "Failed to encode OVN metrics");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if let Some(handle) = &state.self_metrics {
        body.push_str(&handle.render());
    }

    ([(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)], body).into_response()
}
