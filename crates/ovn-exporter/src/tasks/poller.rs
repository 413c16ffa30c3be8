//! Poll loop driving the collectors.
//!
//! One pass runs every collector in [`Collector::ORDER`]. Passes never
//! overlap: the next one starts an interval after the previous one ends.
//!
//! # Graceful Shutdown
//!
//! The loop exits when its cancellation token fires, either between passes
//! or by dropping an in-flight pass.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::appctl::{CommandRunner, StatusQueries};
use crate::backend::OvnBackend;
use crate::collectors::{
    cluster, inventory, status, storage, CollectionContext, Collector, CollectorKind,
};
use crate::config::Config;
use crate::errors::ExporterError;
use crate::observability::metrics::{record_collector_run, record_poll_pass};
use crate::observability::OvnMetrics;
use crate::tracker::FailureTracker;

/// What happened to one collector in a pass.
#[derive(Debug)]
pub enum CollectorOutcome {
    Ok,
    /// Failed; the pass continued.
    Isolated(ExporterError),
    /// Failed and stopped the pass.
    Aborted(ExporterError),
}

impl CollectorOutcome {
    fn status(&self) -> &'static str {
        match self {
            CollectorOutcome::Ok => "success",
            CollectorOutcome::Isolated(_) => "isolated",
            CollectorOutcome::Aborted(_) => "aborted",
        }
    }
}

/// Collectors that ran in one pass, in order.
#[derive(Debug, Default)]
pub struct PassReport {
    pub outcomes: Vec<(Collector, CollectorOutcome)>,
}

impl PassReport {
    /// Collectors that ran, in order.
    #[must_use]
    pub fn collectors(&self) -> Vec<Collector> {
        self.outcomes.iter().map(|(c, _)| *c).collect()
    }

    /// The collector that stopped the pass, if any.
    #[must_use]
    pub fn aborted_at(&self) -> Option<Collector> {
        self.outcomes
            .iter()
            .find(|(_, o)| matches!(o, CollectorOutcome::Aborted(_)))
            .map(|(c, _)| *c)
    }

    /// Outcome of `collector`, if it ran.
    #[must_use]
    pub fn outcome(&self, collector: Collector) -> Option<&CollectorOutcome> {
        self.outcomes
            .iter()
            .find(|(c, _)| *c == collector)
            .map(|(_, o)| o)
    }
}

/// Owns everything a pass needs, including the failure tracker.
pub struct Poller {
    config: Arc<Config>,
    backend: Arc<dyn OvnBackend>,
    runner: Arc<dyn CommandRunner>,
    queries: StatusQueries,
    metrics: Arc<OvnMetrics>,
    tracker: FailureTracker,
}

impl Poller {
    pub fn new(
        config: Arc<Config>,
        backend: Arc<dyn OvnBackend>,
        runner: Arc<dyn CommandRunner>,
        metrics: Arc<OvnMetrics>,
    ) -> Self {
        let queries = StatusQueries::new(&config.appctl_binary, &config.ovsdb_tool_binary);
        Self {
            config,
            backend,
            runner,
            queries,
            metrics,
            tracker: FailureTracker::default(),
        }
    }

    /// Storage-check failure counters.
    #[must_use]
    pub fn tracker(&self) -> &FailureTracker {
        &self.tracker
    }

    /// Run every collector once.
    pub async fn run_pass(&mut self) -> PassReport {
        let started = Instant::now();
        let ctx = CollectionContext {
            config: &self.config,
            backend: self.backend.as_ref(),
            runner: self.runner.as_ref(),
            queries: &self.queries,
            metrics: &self.metrics,
        };
        let tracker = &mut self.tracker;

        let mut report = PassReport::default();
        let mut clustered = false;

        for collector in Collector::ORDER {
            let result = match collector {
                Collector::Status => status::collect_status(ctx).await,
                Collector::DbFileSize => storage::collect_db_file_size(ctx).await,
                Collector::RequestErrors => storage::collect_request_errors(ctx),
                Collector::DbStatus => storage::collect_db_status(ctx, tracker).await,
                Collector::Chassis => inventory::collect_chassis(ctx).await,
                Collector::LogicalSwitch => inventory::collect_logical_switches(ctx).await,
                Collector::LogicalSwitchPort => {
                    inventory::collect_logical_switch_ports(ctx).await
                }
                Collector::ClusterEnabled => {
                    cluster::collect_cluster_enabled(ctx).await.map(|enabled| {
                        clustered = enabled;
                    })
                }
                Collector::ClusterInfo => {
                    if !clustered {
                        debug!(target: "ovn.poller", "Database not clustered, skipping cluster info");
                        continue;
                    }
                    cluster::collect_cluster_info(ctx).await
                }
            };

            let outcome = match (result, collector.kind()) {
                (Ok(()), _) => CollectorOutcome::Ok,
                (Err(e), CollectorKind::IsolateAndContinue) => {
                    debug!(
                        target: "ovn.poller",
                        collector = %collector,
                        error_type = e.error_type(),
                        "Collector failed, continuing"
                    );
                    CollectorOutcome::Isolated(e)
                }
                (Err(e), CollectorKind::AbortRemaining) => {
                    warn!(
                        target: "ovn.poller",
                        collector = %collector,
                        error_type = e.error_type(),
                        error = %e,
                        "Collector failed, skipping the rest of this pass"
                    );
                    CollectorOutcome::Aborted(e)
                }
            };

            record_collector_run(collector.name(), outcome.status());
            let aborted = matches!(outcome, CollectorOutcome::Aborted(_));
            report.outcomes.push((collector, outcome));
            if aborted {
                break;
            }
        }

        let pass_outcome = if report.aborted_at().is_some() {
            "aborted"
        } else {
            "complete"
        };
        record_poll_pass(pass_outcome, started.elapsed());
        debug!(
            target: "ovn.poller",
            outcome = pass_outcome,
            collectors = report.outcomes.len(),
            "Poll pass finished"
        );

        report
    }
}

/// Run passes until `cancel_token` fires.
pub async fn start_poller(mut poller: Poller, interval: Duration, cancel_token: CancellationToken) {
    info!(target: "ovn.poller", interval_seconds = interval.as_secs(), "Poller started");

    loop {
        tokio::select! {
            _ = poller.run_pass() => {}
            () = cancel_token.cancelled() => break,
        }

        tokio::select! {
            () = tokio::time::sleep(interval) => {}
            () = cancel_token.cancelled() => break,
        }
    }

    info!(target: "ovn.poller", "Poller received shutdown signal, exiting");
}
