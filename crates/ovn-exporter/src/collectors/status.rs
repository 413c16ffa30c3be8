//! Process and role health of the OVN components.

use tracing::warn;

use super::CollectionContext;
use crate::database::Database;
use crate::errors::ExporterError;
use crate::observability::registry::{sample, Sample};
use crate::parser::{cluster_servers, northd_socket_from_pid, parse_northd_status, NorthdStatus};

/// Component label for ovn-northd.
pub const NORTHD_COMPONENT: &str = "ovn-northd";

/// Publish `ovn_status` and `ovn_status_content`.
///
/// Every failure here degrades to a 0 value or an empty content label;
/// the pass always continues.
pub async fn collect_status(ctx: CollectionContext<'_>) -> Result<(), ExporterError> {
    let mut status: Vec<Sample> = Vec::with_capacity(3);
    for database in Database::ALL {
        let role = match ctx.backend.cluster_role_info(database.app_name()).await {
            Ok(info) => info.role,
            Err(e) => {
                warn!(target: "ovn.collector", component = database.app_name(), error = %e, "Failed to get role");
                0
            }
        };
        status.push(sample([database.app_name()], f64::from(role)));
    }
    status.push(sample(
        [NORTHD_COMPONENT],
        f64::from(northd_status(ctx).await.value()),
    ));
    ctx.metrics.status.publish(status);

    let mut content: Vec<Sample> = Vec::with_capacity(2);
    for database in Database::ALL {
        let servers = match ctx
            .queries
            .cluster_status(
                ctx.runner,
                &ctx.config.database(database).socket_control,
                database,
            )
            .await
        {
            Ok(output) => cluster_servers(&output).unwrap_or_default().to_string(),
            Err(e) => {
                warn!(target: "ovn.collector", database = %database, error = %e, "Failed to get cluster status");
                String::new()
            }
        };
        content.push(sample([database.app_name().to_string(), servers], 1.0));
    }
    ctx.metrics.status_content.publish(content);

    Ok(())
}

async fn northd_status(ctx: CollectionContext<'_>) -> NorthdStatus {
    let socket = match &ctx.config.northd_socket_control {
        Some(socket) => socket.clone(),
        None => match tokio::fs::read_to_string(&ctx.config.northd_pid_path).await {
            Ok(pid) => northd_socket_from_pid(&pid),
            Err(e) => {
                warn!(
                    target: "ovn.collector",
                    path = %ctx.config.northd_pid_path,
                    error = %e,
                    "Failed to read ovn-northd PID file"
                );
                return NorthdStatus::Unknown;
            }
        },
    };

    match ctx.queries.northd_status(ctx.runner, &socket).await {
        Ok(output) => parse_northd_status(&output),
        Err(e) => {
            warn!(target: "ovn.collector", socket = %socket, error = %e, "Failed to get ovn-northd status");
            NorthdStatus::Unknown
        }
    }
}
