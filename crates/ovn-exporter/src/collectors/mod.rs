//! Metric collectors.
//!
//! Each collector reads from the backend or runs a status command and
//! publishes into the families it owns in [`OvnMetrics`]. A collector
//! replaces its families wholesale, so objects that disappeared between
//! passes lose their series.
//!
//! # Error Handling
//!
//! Collectors come in two flavors, see [`CollectorKind`]:
//! - per-database collectors stop the whole pass on the first failing
//!   database ([`CollectorKind::AbortRemaining`])
//! - inventory collectors log, count the failure, leave their families
//!   empty and let the pass continue ([`CollectorKind::IsolateAndContinue`])

pub mod cluster;
pub mod inventory;
pub mod status;
pub mod storage;

use std::fmt;

use tracing::warn;

use crate::appctl::{CommandRunner, StatusQueries};
use crate::backend::OvnBackend;
use crate::config::Config;
use crate::errors::ExporterError;
use crate::observability::OvnMetrics;

/// Shared, borrowed state handed to every collector in a pass.
#[derive(Clone, Copy)]
pub struct CollectionContext<'a> {
    pub config: &'a Config,
    pub backend: &'a dyn OvnBackend,
    pub runner: &'a dyn CommandRunner,
    pub queries: &'a StatusQueries,
    pub metrics: &'a OvnMetrics,
}

/// How a collector failure affects the rest of the pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorKind {
    /// Stop the pass; later collectors keep their previous series.
    AbortRemaining,
    /// Log and continue with the next collector.
    IsolateAndContinue,
}

/// The collectors, in the order a pass runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collector {
    Status,
    DbFileSize,
    RequestErrors,
    DbStatus,
    Chassis,
    LogicalSwitch,
    LogicalSwitchPort,
    ClusterEnabled,
    ClusterInfo,
}

impl Collector {
    /// Pass order. [`Collector::ClusterInfo`] only runs when the
    /// northbound database is clustered.
    pub const ORDER: [Collector; 9] = [
        Collector::Status,
        Collector::DbFileSize,
        Collector::RequestErrors,
        Collector::DbStatus,
        Collector::Chassis,
        Collector::LogicalSwitch,
        Collector::LogicalSwitchPort,
        Collector::ClusterEnabled,
        Collector::ClusterInfo,
    ];

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Collector::Status => "status",
            Collector::DbFileSize => "db_file_size",
            Collector::RequestErrors => "request_errors",
            Collector::DbStatus => "db_status",
            Collector::Chassis => "chassis",
            Collector::LogicalSwitch => "logical_switch",
            Collector::LogicalSwitchPort => "logical_switch_port",
            Collector::ClusterEnabled => "cluster_enabled",
            Collector::ClusterInfo => "cluster_info",
        }
    }

    #[must_use]
    pub const fn kind(&self) -> CollectorKind {
        match self {
            Collector::DbFileSize | Collector::DbStatus | Collector::ClusterInfo => {
                CollectorKind::AbortRemaining
            }
            Collector::Status
            | Collector::RequestErrors
            | Collector::Chassis
            | Collector::LogicalSwitch
            | Collector::LogicalSwitchPort
            | Collector::ClusterEnabled => CollectorKind::IsolateAndContinue,
        }
    }
}

impl fmt::Display for Collector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Run a backend query for an inventory collector.
///
/// On success `process` publishes the rows. On failure the error tally is
/// incremented, `on_error` clears the collector's families and the error
/// is returned for the pass report.
pub async fn collect_with_handler<T, F, P, C>(
    ctx: CollectionContext<'_>,
    collector: Collector,
    query: F,
    process: P,
    on_error: C,
) -> Result<(), ExporterError>
where
    F: std::future::Future<Output = Result<T, crate::errors::BackendError>>,
    P: FnOnce(T),
    C: FnOnce(),
{
    match query.await {
        Ok(data) => {
            process(data);
            Ok(())
        }
        Err(e) => {
            ctx.metrics.errors.increment();
            on_error();
            warn!(target: "ovn.collector", collector = %collector, error = %e, "Backend query failed");
            Err(e.into())
        }
    }
}
