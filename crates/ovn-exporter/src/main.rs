//! OVN Exporter
//!
//! Prometheus exporter for OVN northbound/southbound databases and ovn-northd.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize Prometheus self-metrics recorder
//! 3. Try to connect to both databases once; on failure spawn the bounded
//!    retry task, which exits the process if the backend never comes up
//! 4. Bind and start the HTTP server (metrics, health, readiness)
//! 5. Spawn the poll loop
//! 6. Wait for shutdown signal

#![warn(clippy::pedantic)]

use std::net::SocketAddr;
use std::sync::Arc;

use ovn_exporter::appctl::{CommandRunner, ProcessRunner};
use ovn_exporter::backend::{OvnBackend, OvsdbClient};
use ovn_exporter::config::Config;
use ovn_exporter::connection::{ConnectionManager, RetryPolicy};
use ovn_exporter::observability::metrics::init_metrics_recorder;
use ovn_exporter::observability::{HealthState, OvnMetrics};
use ovn_exporter::routes::{build_routes, AppState};
use ovn_exporter::tasks::{start_poller, Poller};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ovn_exporter=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting OVN exporter");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;
    info!(config = ?config, "Configuration loaded successfully");
    let config = Arc::new(config);

    // Must happen before any self-metric is recorded
    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;

    let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner::new(config.poll_timeout));
    let backend: Arc<dyn OvnBackend> = Arc::new(OvsdbClient::new(&config, Arc::clone(&runner)));
    let health_state = Arc::new(HealthState::new());
    let ovn_metrics = Arc::new(OvnMetrics::new()?);

    let connections = ConnectionManager::new(
        Arc::clone(&backend),
        RetryPolicy::default(),
        Arc::clone(&health_state),
    );
    let initial = connections.connect().await;
    if let Err(e) = initial {
        warn!(error = %e, "Failed to connect to OVN databases, retrying in background");
        tokio::spawn(async move {
            if let Err(e) = connections.retry_connect().await {
                error!(error = %e, "OVN databases unreachable, exiting");
                std::process::exit(1);
            }
        });
    }

    let shutdown_token = CancellationToken::new();

    // Bind listener BEFORE spawning to fail fast on bind errors
    let addr: SocketAddr = config.listen_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.listen_address, "Invalid listen address");
        format!("Invalid listen address: {e}")
    })?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!(error = %e, addr = %addr, "Failed to bind HTTP server");
        format!("Failed to bind HTTP server to {addr}: {e}")
    })?;

    let app = build_routes(
        &config,
        AppState {
            metrics: Arc::clone(&ovn_metrics),
            self_metrics: Some(prometheus_handle),
            health: Arc::clone(&health_state),
        },
    );

    let server_token = shutdown_token.child_token();
    let server_handle = tokio::spawn(async move {
        info!(addr = %addr, "HTTP server starting");
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            server_token.cancelled().await;
            info!("HTTP server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "HTTP server failed");
        }
    });

    let poller = Poller::new(
        Arc::clone(&config),
        Arc::clone(&backend),
        Arc::clone(&runner),
        Arc::clone(&ovn_metrics),
    );
    let poller_handle = tokio::spawn(start_poller(
        poller,
        config.poll_interval,
        shutdown_token.child_token(),
    ));

    info!("OVN exporter running - press Ctrl+C to shutdown");
    shutdown_signal().await;

    info!("Shutdown signal received");
    health_state.set_not_ready();
    shutdown_token.cancel();
    let _ = tokio::join!(server_handle, poller_handle);

    info!("OVN exporter shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
