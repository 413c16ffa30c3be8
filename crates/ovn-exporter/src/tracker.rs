//! Consecutive-failure tracking for per-database storage checks.
//!
//! Each database has a counter of consecutive failed checks. A success
//! resets it. Reaching the threshold reports a persistent outage once and
//! starts counting again from zero, so the outage is reported again only
//! after another full run of failures. Remediation (restoring the
//! database) is left to operators; this only signals.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::database::Database;

/// Consecutive failures before a persistent outage is reported.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 6;

/// Result of recording one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Check succeeded; counter is zero.
    Healthy,
    /// Check failed; carries the current consecutive count.
    RepeatedFailure(u32),
    /// Threshold reached; the counter has been reset to zero.
    PersistentOutage,
}

/// Per-database consecutive failure counters.
///
/// Owned by the poll loop and mutated only from it.
#[derive(Debug)]
pub struct FailureTracker {
    threshold: u32,
    counts: HashMap<Database, u32>,
}

impl Default for FailureTracker {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD)
    }
}

impl FailureTracker {
    /// Create a tracker that trips after `threshold` consecutive failures.
    #[must_use]
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            counts: HashMap::new(),
        }
    }

    /// Record the result of one health check for `database`.
    pub fn record_check(&mut self, database: Database, ok: bool) -> CheckOutcome {
        let count = self.counts.entry(database).or_insert(0);

        if ok {
            *count = 0;
            return CheckOutcome::Healthy;
        }

        *count += 1;
        if *count >= self.threshold {
            warn!(
                target: "ovn.tracker",
                database = %database,
                failures = *count,
                "Failed to get {} status for {} times, ready to restore OVN DB",
                database,
                *count
            );
            *count = 0;
            return CheckOutcome::PersistentOutage;
        }

        info!(
            target: "ovn.tracker",
            database = %database,
            failures = *count,
            "Failed to get {} status for {} times",
            database,
            *count
        );
        CheckOutcome::RepeatedFailure(*count)
    }

    /// Current consecutive failure count for `database`.
    #[must_use]
    pub fn failures(&self, database: Database) -> u32 {
        self.counts.get(&database).copied().unwrap_or(0)
    }
}
