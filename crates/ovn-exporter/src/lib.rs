//! OVN Exporter Library
//!
//! Periodically probes an OVN control plane (the northbound and southbound
//! ovsdb-server databases plus ovn-northd) and exposes what it finds as
//! Prometheus gauges.
//!
//! # Architecture
//!
//! ```text
//! Poller (one background task)
//! └── runs Collectors in a fixed order every interval
//!     ├── OvnBackend (OVSDB JSON-RPC) for chassis / switches / ports
//!     ├── CommandRunner (ovn-appctl, ovsdb-tool) for status text
//!     │   └── parser turns that text into typed records
//!     └── publish into OvnMetrics, read by GET /metrics
//! ```
//!
//! Scrapes never trigger collection; they read whatever the last pass
//! published.
//!
//! # Modules
//!
//! - [`config`] - Configuration from environment
//! - [`backend`] - Typed database queries and the OVSDB client
//! - [`appctl`] - External status commands
//! - [`parser`] - Status text parsing
//! - [`collectors`] - Per-concern metric collectors
//! - [`tasks`] - The poll loop
//! - [`connection`] - Bounded connection establishment
//! - [`tracker`] - Consecutive storage-failure tracking
//! - [`observability`] - Metric families, self-metrics, health probes
//! - [`routes`] - HTTP router

pub mod appctl;
pub mod backend;
pub mod collectors;
pub mod config;
pub mod connection;
pub mod database;
pub mod errors;
pub mod observability;
pub mod parser;
pub mod routes;
pub mod tasks;
pub mod tracker;
