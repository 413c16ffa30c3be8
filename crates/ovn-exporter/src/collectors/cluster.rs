//! Raft clustering collectors.

use tracing::error;

use super::CollectionContext;
use crate::database::Database;
use crate::errors::ExporterError;
use crate::observability::registry::{sample, ClusterFamilies, Sample};
use crate::parser::{parse_cluster_status, ClusterStatus};

/// Publish `ovn_cluster_enabled` for the northbound database file.
///
/// Returns whether the database is clustered. A failing check is reported
/// as not clustered (0) and also returned as an error so the pass report
/// records it.
pub async fn collect_cluster_enabled(ctx: CollectionContext<'_>) -> Result<bool, ExporterError> {
    let db_file = &ctx.config.northbound.file_data_path;
    let result = ctx.queries.is_clustered(ctx.runner, db_file).await;

    let clustered = *result.as_ref().unwrap_or(&false);
    ctx.metrics
        .cluster_enabled
        .publish([sample([db_file], if clustered { 1.0 } else { 0.0 })]);

    match result {
        Ok(clustered) => Ok(clustered),
        Err(e) => {
            error!(target: "ovn.collector", db_file = %db_file, error = %e, "Failed to get cluster status");
            Err(e.into())
        }
    }
}

/// Staged rows for every family in [`ClusterFamilies`].
#[derive(Default)]
struct ClusterRows {
    role: Vec<Sample>,
    status: Vec<Sample>,
    term: Vec<Sample>,
    leader_self: Vec<Sample>,
    vote_self: Vec<Sample>,
    election_timer: Vec<Sample>,
    log_not_committed: Vec<Sample>,
    log_not_applied: Vec<Sample>,
    log_index_start: Vec<Sample>,
    log_index_next: Vec<Sample>,
    inbound_connections: Vec<Sample>,
    outbound_connections: Vec<Sample>,
    inbound_connection_errors: Vec<Sample>,
    outbound_connection_errors: Vec<Sample>,
}

impl ClusterRows {
    fn push(&mut self, database: Database, c: &ClusterStatus) {
        let member = [database.name(), c.server_id.as_str(), c.cluster_id.as_str()];
        let numeric = |value: u64| sample(member, value as f64);
        let flag = |set: bool| sample(member, if set { 1.0 } else { 0.0 });

        self.role.push(sample(
            [database.name(), c.server_id.as_str(), c.cluster_id.as_str(), c.role.as_str()],
            1.0,
        ));
        self.status.push(sample(
            [database.name(), c.server_id.as_str(), c.cluster_id.as_str(), c.status.as_str()],
            1.0,
        ));
        self.term.push(numeric(c.term));
        self.leader_self.push(flag(c.is_leader_self()));
        self.vote_self.push(flag(c.is_vote_self()));
        self.election_timer.push(numeric(c.election_timer));
        self.log_not_committed.push(numeric(c.entries_not_committed));
        self.log_not_applied.push(numeric(c.entries_not_applied));
        self.log_index_start.push(numeric(c.log_index_start));
        self.log_index_next.push(numeric(c.log_index_next));
        self.inbound_connections.push(numeric(c.connections.inbound));
        self.outbound_connections.push(numeric(c.connections.outbound));
        self.inbound_connection_errors
            .push(numeric(c.connections.inbound_errors));
        self.outbound_connection_errors
            .push(numeric(c.connections.outbound_errors));
    }

    fn publish(self, families: &ClusterFamilies) {
        families.role.publish(self.role);
        families.status.publish(self.status);
        families.term.publish(self.term);
        families.leader_self.publish(self.leader_self);
        families.vote_self.publish(self.vote_self);
        families.election_timer.publish(self.election_timer);
        families.log_not_committed.publish(self.log_not_committed);
        families.log_not_applied.publish(self.log_not_applied);
        families.log_index_start.publish(self.log_index_start);
        families.log_index_next.publish(self.log_index_next);
        families.inbound_connections.publish(self.inbound_connections);
        families.outbound_connections.publish(self.outbound_connections);
        families
            .inbound_connection_errors
            .publish(self.inbound_connection_errors);
        families
            .outbound_connection_errors
            .publish(self.outbound_connection_errors);
    }
}

/// Publish the `ovn_cluster_*` membership families for both databases.
pub async fn collect_cluster_info(ctx: CollectionContext<'_>) -> Result<(), ExporterError> {
    let mut rows = ClusterRows::default();

    for database in Database::ALL {
        let output = match ctx
            .queries
            .cluster_status(
                ctx.runner,
                &ctx.config.database(database).socket_control,
                database,
            )
            .await
        {
            Ok(output) => output,
            Err(e) => {
                error!(target: "ovn.collector", database = %database, error = %e, "Failed to get cluster info");
                rows.publish(&ctx.metrics.cluster);
                return Err(ExporterError::from(e).for_database(database));
            }
        };

        rows.push(database, &parse_cluster_status(&output));
    }

    rows.publish(&ctx.metrics.cluster);
    Ok(())
}
