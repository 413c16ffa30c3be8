//! Backend connection establishment.
//!
//! Startup tries once in the foreground. If that fails the caller spawns
//! [`ConnectionManager::retry_connect`] so the HTTP server can serve while
//! the backend comes up. Retrying is bounded: a backend that stays down
//! needs an operator, so exhaustion is fatal to the process.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::backend::OvnBackend;
use crate::errors::{BackendError, ConnectError};
use crate::observability::metrics::record_connect_attempt;
use crate::observability::HealthState;

/// Bounded retry schedule for connection establishment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Failed attempts tolerated before giving up.
    pub max_retries: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Attempts made before [`ConnectError::RetriesExhausted`].
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Owns connection establishment for an [`OvnBackend`].
pub struct ConnectionManager {
    backend: Arc<dyn OvnBackend>,
    policy: RetryPolicy,
    health: Arc<HealthState>,
}

impl ConnectionManager {
    pub fn new(backend: Arc<dyn OvnBackend>, policy: RetryPolicy, health: Arc<HealthState>) -> Self {
        Self {
            backend,
            policy,
            health,
        }
    }

    /// One connection attempt. Marks the service ready on success.
    pub async fn connect(&self) -> Result<(), BackendError> {
        match self.backend.connect().await {
            Ok(()) => {
                record_connect_attempt("success");
                self.health.set_ready();
                info!(target: "ovn.connection", "Connected to OVN databases");
                Ok(())
            }
            Err(e) => {
                record_connect_attempt("error");
                Err(e)
            }
        }
    }

    /// Retry [`connect`](Self::connect) on the policy's schedule.
    ///
    /// # Errors
    ///
    /// `ConnectError::RetriesExhausted` after `max_attempts` consecutive
    /// failures. No further attempt is made.
    pub async fn retry_connect(&self) -> Result<(), ConnectError> {
        let attempts = self.policy.max_attempts();

        for attempt in 1..=attempts {
            match self.connect().await {
                Ok(()) => {
                    info!(target: "ovn.connection", attempt, "Reconnected to OVN databases");
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        target: "ovn.connection",
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "Failed to connect to OVN databases"
                    );
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.policy.delay).await;
            }
        }

        error!(target: "ovn.connection", attempts, "Giving up on OVN database connection");
        Err(ConnectError::RetriesExhausted { attempts })
    }
}
