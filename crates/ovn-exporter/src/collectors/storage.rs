//! Per-database file and storage collectors.
//!
//! These walk the databases in [`Database::ALL`] order and stop at the first
//! failure. Rows gathered for earlier databases are still published.

use tracing::error;

use super::CollectionContext;
use crate::database::Database;
use crate::errors::ExporterError;
use crate::observability::registry::{sample, Sample};
use crate::parser::parse_storage_status;
use crate::tracker::FailureTracker;

/// Publish `ovn_db_file_size`.
pub async fn collect_db_file_size(ctx: CollectionContext<'_>) -> Result<(), ExporterError> {
    let mut rows: Vec<Sample> = Vec::with_capacity(Database::ALL.len());

    for database in Database::ALL {
        let path = &ctx.config.database(database).file_data_path;
        match tokio::fs::metadata(path).await {
            Ok(meta) => rows.push(sample([database.name()], meta.len() as f64)),
            Err(source) => {
                error!(target: "ovn.collector", database = %database, error = %source, "Failed to get the DB size");
                ctx.metrics.db_file_size.publish(rows);
                return Err(ExporterError::Io {
                    path: path.clone(),
                    source,
                }
                .for_database(database));
            }
        }
    }

    ctx.metrics.db_file_size.publish(rows);
    Ok(())
}

/// Publish `ovn_failed_req_count` from the error tally.
pub fn collect_request_errors(ctx: CollectionContext<'_>) -> Result<(), ExporterError> {
    ctx.metrics
        .failed_requests
        .publish([sample(Vec::<String>::new(), ctx.metrics.errors.get() as f64)]);
    Ok(())
}

/// Publish `ovn_db_status` and feed each result to the failure tracker.
///
/// A storage status that is not OK is published as 0 and counted by the
/// tracker, but it does not end the pass: the other database is still
/// queried and the chassis, logical switch and cluster collectors still run.
/// Only a failing command stops the pass.
pub async fn collect_db_status(
    ctx: CollectionContext<'_>,
    tracker: &mut FailureTracker,
) -> Result<(), ExporterError> {
    let mut rows: Vec<Sample> = Vec::with_capacity(Database::ALL.len());

    for database in Database::ALL {
        let output = match ctx
            .queries
            .storage_status(
                ctx.runner,
                &ctx.config.database(database).socket_control,
                database,
            )
            .await
        {
            Ok(output) => output,
            Err(e) => {
                error!(target: "ovn.collector", database = %database, error = %e, "Failed to get DB status");
                ctx.metrics.db_status.publish(rows);
                return Err(ExporterError::from(e).for_database(database));
            }
        };

        let ok = parse_storage_status(&output);
        rows.push(sample([database.name()], if ok { 1.0 } else { 0.0 }));
        tracker.record_check(database, ok);
    }

    ctx.metrics.db_status.publish(rows);
    Ok(())
}
