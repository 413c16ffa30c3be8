//! OVN exporter error types.
//!
//! Collectors never surface these to scrapers. They are logged, counted in
//! the failed-request tally, and decide whether a poll pass continues.

use std::time::Duration;
use thiserror::Error;

use crate::database::Database;

/// Errors from the OVSDB JSON-RPC backend client.
#[derive(Debug, Error)]
pub enum BackendError {
    /// No usable session for the database and re-dialing failed.
    #[error("Not connected to {0}")]
    NotConnected(Database),

    /// Socket-level failure.
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The server did not reply within the poll timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The server replied with a JSON-RPC or OVSDB error object.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// The reply could not be decoded into the expected rows.
    #[error("Malformed reply: {0}")]
    Malformed(String),

    /// The remote string is neither `unix:` nor `tcp:`.
    #[error("Unsupported remote: {0}")]
    UnsupportedRemote(String),

    /// A status command needed by the RPC failed.
    #[error(transparent)]
    Command(#[from] CommandError),
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Malformed(err.to_string())
    }
}

/// Errors from running an external status command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The process could not be started.
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The process exited abnormally. `output` is the combined stdout+stderr.
    #[error("{program} exited with {status}: {output}")]
    Failed {
        program: String,
        status: String,
        output: String,
    },

    /// The process did not finish within the poll timeout.
    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },
}

/// Initial connection establishment gave up.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("Failed to connect to OVN databases after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

/// Top-level error returned by collectors.
#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("Backend query failed: {0}")]
    Backend(#[from] BackendError),

    #[error("Status command failed: {0}")]
    Command(#[from] CommandError),

    /// Failure tied to one database in a per-database collector.
    #[error("{database}: {source}")]
    Database {
        database: Database,
        #[source]
        source: Box<ExporterError>,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ExporterError {
    /// Attach the database a per-database step was working on.
    #[must_use]
    pub fn for_database(self, database: Database) -> Self {
        ExporterError::Database {
            database,
            source: Box::new(self),
        }
    }

    /// Short, bounded label for self-metrics.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            ExporterError::Backend(_) => "backend",
            ExporterError::Command(_) => "command",
            ExporterError::Database { source, .. } => source.error_type(),
            ExporterError::Io { .. } => "io",
        }
    }
}
