//! Health endpoints for the OVN exporter.
//!
//! - `GET /health` - Liveness probe (is the process running?)
//! - `GET /ready` - Readiness probe (has the backend been reached?)
//!
//! # Health State
//!
//! The `HealthState` tracks only readiness. It flips once the first backend
//! connection succeeds and stays set through later outages, which show up
//! in the metrics instead. It is cleared again when shutdown begins.

use axum::{extract::State, http::StatusCode, routing::get, Router};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Readiness flag shared by the connection manager and the health router.
#[derive(Debug, Default)]
pub struct HealthState {
    /// Whether the backend has been reached and shutdown has not begun.
    ready: AtomicBool,
}

impl HealthState {
    /// Create a new health state (ready=false).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the backend as reached.
    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Mark the exporter as not ready (during shutdown).
    pub fn set_not_ready(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    /// Check if the exporter is ready.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Create the health router with liveness and readiness endpoints.
///
/// # Endpoints
///
/// - `GET /health` - Returns 200 while the process is serving (liveness)
/// - `GET /ready` - Returns 200 once the backend was reached, 503 otherwise
pub fn health_router(health_state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/health", get(liveness_handler))
        .route("/ready", get(readiness_handler))
        .with_state(health_state)
}

/// Liveness probe handler. Answering at all means the process is up.
async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe handler.
///
/// Returns 503 Service Unavailable before the first successful connection
/// and after shutdown starts.
async fn readiness_handler(State(state): State<Arc<HealthState>>) -> StatusCode {
    if state.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
