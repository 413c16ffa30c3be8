//! OVN metric families.
//!
//! Every family is a `prometheus` `GaugeVec` behind its own lock. Collectors
//! build the complete set of rows for a family first and then swap them in
//! with [`GaugeFamily::publish`], so a scrape sees either the previous pass
//! or the new one for that family, never a half-cleared vector. Families are
//! independent; a scrape may see some families from the current pass and
//! others from the previous one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use prometheus::core::Collector;
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, GaugeVec, Opts, TextEncoder};
use tracing::debug;

const NAMESPACE: &str = "ovn";

/// One row of a family: label values in declaration order, and the value.
pub type Sample = (Vec<String>, f64);

/// A gauge family replaced as a unit on every write.
pub struct GaugeFamily {
    name: String,
    vec: RwLock<GaugeVec>,
}

impl GaugeFamily {
    fn new(name: &str, help: &str, labels: &[&str]) -> Result<Self, prometheus::Error> {
        let vec = GaugeVec::new(Opts::new(name, help).namespace(NAMESPACE), labels)?;
        Ok(Self {
            name: format!("{NAMESPACE}_{name}"),
            vec: RwLock::new(vec),
        })
    }

    /// Replace every series with `samples`.
    pub fn publish<I>(&self, samples: I)
    where
        I: IntoIterator<Item = Sample>,
    {
        let samples: Vec<Sample> = samples.into_iter().collect();
        let vec = self.vec.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        vec.reset();
        for (labels, value) in &samples {
            let values: Vec<&str> = labels.iter().map(String::as_str).collect();
            match vec.get_metric_with_label_values(&values) {
                Ok(gauge) => gauge.set(*value),
                Err(e) => debug!(target: "ovn.collector", family = %self.name, error = %e, "Dropping sample"),
            }
        }
    }

    /// Drop every series.
    pub fn clear(&self) {
        self.publish(std::iter::empty());
    }

    /// Snapshot for encoding.
    #[must_use]
    pub fn collect(&self) -> Vec<MetricFamily> {
        let vec = self.vec.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        vec.collect()
    }

    /// Value of the series whose labels include all of `labels`.
    #[must_use]
    pub fn value(&self, labels: &[(&str, &str)]) -> Option<f64> {
        self.collect()
            .iter()
            .flat_map(|family| family.get_metric().iter())
            .find(|metric| {
                labels.iter().all(|(name, value)| {
                    metric
                        .get_label()
                        .iter()
                        .any(|pair| pair.get_name() == *name && pair.get_value() == *value)
                })
            })
            .map(|metric| metric.get_gauge().get_value())
    }

    /// Number of series currently exposed.
    #[must_use]
    pub fn series_count(&self) -> usize {
        self.collect()
            .iter()
            .map(|family| family.get_metric().len())
            .sum()
    }
}

/// Process-lifetime count of failed backend queries.
#[derive(Debug, Default)]
pub struct ErrorTally(AtomicU64);

impl ErrorTally {
    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-database Raft families from `cluster/status`.
pub struct ClusterFamilies {
    pub role: GaugeFamily,
    pub status: GaugeFamily,
    pub term: GaugeFamily,
    pub leader_self: GaugeFamily,
    pub vote_self: GaugeFamily,
    pub election_timer: GaugeFamily,
    pub log_not_committed: GaugeFamily,
    pub log_not_applied: GaugeFamily,
    pub log_index_start: GaugeFamily,
    pub log_index_next: GaugeFamily,
    pub inbound_connections: GaugeFamily,
    pub outbound_connections: GaugeFamily,
    pub inbound_connection_errors: GaugeFamily,
    pub outbound_connection_errors: GaugeFamily,
}

impl ClusterFamilies {
    fn new() -> Result<Self, prometheus::Error> {
        const MEMBER: &[&str] = &["database", "server_id", "cluster_id"];
        let numeric = |name: &str, help: &str| GaugeFamily::new(name, help, MEMBER);

        Ok(Self {
            role: GaugeFamily::new(
                "cluster_role",
                "Raft role of this server (value is always 1).",
                &["database", "server_id", "cluster_id", "role"],
            )?,
            status: GaugeFamily::new(
                "cluster_status",
                "Raft membership status of this server (value is always 1).",
                &["database", "server_id", "cluster_id", "status"],
            )?,
            term: numeric("cluster_term", "Current Raft term.")?,
            leader_self: numeric(
                "cluster_leader_self",
                "1 if this server is the cluster leader.",
            )?,
            vote_self: numeric(
                "cluster_vote_self",
                "1 if this server voted for itself in the current term.",
            )?,
            election_timer: numeric(
                "cluster_election_timer",
                "Raft election timer in milliseconds.",
            )?,
            log_not_committed: numeric(
                "cluster_log_not_committed",
                "Log entries not yet committed.",
            )?,
            log_not_applied: numeric(
                "cluster_log_not_applied",
                "Log entries not yet applied.",
            )?,
            log_index_start: numeric("cluster_log_index_start", "First log index.")?,
            log_index_next: numeric("cluster_log_index_next", "Next log index.")?,
            inbound_connections: numeric(
                "cluster_inbound_connections_total",
                "Inbound peer connections.",
            )?,
            outbound_connections: numeric(
                "cluster_outbound_connections_total",
                "Outbound peer connections.",
            )?,
            inbound_connection_errors: numeric(
                "cluster_inbound_connections_error_total",
                "Inbound peer connections in error.",
            )?,
            outbound_connection_errors: numeric(
                "cluster_outbound_connections_error_total",
                "Outbound peer connections in error.",
            )?,
        })
    }

    fn all(&self) -> [&GaugeFamily; 14] {
        [
            &self.role,
            &self.status,
            &self.term,
            &self.leader_self,
            &self.vote_self,
            &self.election_timer,
            &self.log_not_committed,
            &self.log_not_applied,
            &self.log_index_start,
            &self.log_index_next,
            &self.inbound_connections,
            &self.outbound_connections,
            &self.inbound_connection_errors,
            &self.outbound_connection_errors,
        ]
    }
}

/// All OVN families plus the error tally.
pub struct OvnMetrics {
    pub status: GaugeFamily,
    pub status_content: GaugeFamily,
    pub db_file_size: GaugeFamily,
    pub failed_requests: GaugeFamily,
    pub db_status: GaugeFamily,
    pub chassis_info: GaugeFamily,
    pub logical_switch_info: GaugeFamily,
    pub logical_switch_ports_num: GaugeFamily,
    pub logical_switch_port_binding: GaugeFamily,
    pub logical_switch_external_id: GaugeFamily,
    pub logical_switch_tunnel_key: GaugeFamily,
    pub logical_switch_port_info: GaugeFamily,
    pub logical_switch_port_tunnel_key: GaugeFamily,
    pub cluster_enabled: GaugeFamily,
    pub cluster: ClusterFamilies,
    pub errors: ErrorTally,
}

impl OvnMetrics {
    /// Build every family.
    ///
    /// # Errors
    ///
    /// Only on an invalid metric or label name.
    pub fn new() -> Result<Self, prometheus::Error> {
        Ok(Self {
            status: GaugeFamily::new(
                "status",
                "Health of OVN components (3 leader/active, 2 candidate, 1 follower/standby, 0 unknown).",
                &["component"],
            )?,
            status_content: GaugeFamily::new(
                "status_content",
                "Cluster servers reported by each database (value is always 1).",
                &["component", "content"],
            )?,
            db_file_size: GaugeFamily::new(
                "db_file_size",
                "Size of the database file in bytes.",
                &["database"],
            )?,
            failed_requests: GaugeFamily::new(
                "failed_req_count",
                "Number of failed requests to the OVN databases.",
                &[],
            )?,
            db_status: GaugeFamily::new(
                "db_status",
                "1 if the database storage reports ok.",
                &["database"],
            )?,
            chassis_info: GaugeFamily::new(
                "chassis_info",
                "Chassis registered in the southbound database.",
                &["hostname", "uuid", "name", "ip"],
            )?,
            logical_switch_info: GaugeFamily::new(
                "logical_switch_info",
                "Logical switches in the northbound database.",
                &["uuid", "name"],
            )?,
            logical_switch_ports_num: GaugeFamily::new(
                "logical_switch_ports_num",
                "Number of ports on a logical switch.",
                &["uuid", "name"],
            )?,
            logical_switch_port_binding: GaugeFamily::new(
                "logical_switch_port_binding",
                "Ports attached to a logical switch.",
                &["uuid", "port", "name"],
            )?,
            logical_switch_external_id: GaugeFamily::new(
                "logical_switch_external_id",
                "External ids set on a logical switch.",
                &["uuid", "key", "value", "name"],
            )?,
            logical_switch_tunnel_key: GaugeFamily::new(
                "logical_switch_tunnel_key",
                "Tunnel key of a logical switch datapath.",
                &["uuid", "name"],
            )?,
            logical_switch_port_info: GaugeFamily::new(
                "logical_switch_port_info",
                "Logical switch ports and their bindings.",
                &[
                    "uuid",
                    "name",
                    "chassis",
                    "logical_switch",
                    "datapath",
                    "port_binding",
                    "mac_address",
                    "ip_address",
                ],
            )?,
            logical_switch_port_tunnel_key: GaugeFamily::new(
                "logical_switch_port_tunnel_key",
                "Tunnel key of a logical switch port binding.",
                &["uuid", "logical_switch", "name"],
            )?,
            cluster_enabled: GaugeFamily::new(
                "cluster_enabled",
                "1 if the northbound database file is clustered.",
                &["db_file"],
            )?,
            cluster: ClusterFamilies::new()?,
            errors: ErrorTally::default(),
        })
    }

    fn families(&self) -> impl Iterator<Item = &GaugeFamily> {
        [
            &self.status,
            &self.status_content,
            &self.db_file_size,
            &self.failed_requests,
            &self.db_status,
            &self.chassis_info,
            &self.logical_switch_info,
            &self.logical_switch_ports_num,
            &self.logical_switch_port_binding,
            &self.logical_switch_external_id,
            &self.logical_switch_tunnel_key,
            &self.logical_switch_port_info,
            &self.logical_switch_port_tunnel_key,
            &self.cluster_enabled,
        ]
        .into_iter()
        .chain(self.cluster.all())
    }

    /// Render every family in the text exposition format.
    ///
    /// # Errors
    ///
    /// Only if encoding fails, which the text encoder does for
    /// malformed families.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let families: Vec<MetricFamily> = self
            .families()
            .flat_map(GaugeFamily::collect)
            .filter(|family| !family.get_metric().is_empty())
            .collect();

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

/// Build one sample.
pub fn sample<S: Into<String>>(labels: impl IntoIterator<Item = S>, value: f64) -> Sample {
    (labels.into_iter().map(Into::into).collect(), value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_replaces_series() {
        let metrics = OvnMetrics::new().unwrap();
        let family = &metrics.logical_switch_info;

        family.publish([sample(["ls-1", "net1"], 1.0), sample(["ls-2", "net2"], 1.0)]);
        assert_eq!(family.series_count(), 2);

        family.publish([sample(["ls-2", "net2"], 1.0)]);
        assert_eq!(family.series_count(), 1);
        assert_eq!(family.value(&[("uuid", "ls-1")]), None);
        assert_eq!(family.value(&[("uuid", "ls-2"), ("name", "net2")]), Some(1.0));
    }

    #[test]
    fn test_wrong_label_count_is_dropped() {
        let metrics = OvnMetrics::new().unwrap();
        metrics
            .db_file_size
            .publish([sample(["OVN_Northbound", "extra"], 1.0), sample(["OVN_Southbound"], 9.0)]);
        assert_eq!(metrics.db_file_size.series_count(), 1);
        assert_eq!(
            metrics.db_file_size.value(&[("database", "OVN_Southbound")]),
            Some(9.0)
        );
    }

    #[test]
    fn test_render_skips_empty_families() {
        let metrics = OvnMetrics::new().unwrap();
        metrics.db_status.publish([sample(["OVN_Northbound"], 1.0)]);
        metrics
            .failed_requests
            .publish([sample(Vec::<String>::new(), 3.0)]);

        let text = metrics.render().unwrap();
        assert!(text.contains("ovn_db_status{database=\"OVN_Northbound\"} 1"));
        assert!(text.contains("ovn_failed_req_count 3"));
        assert!(!text.contains("ovn_chassis_info"));
    }

    #[test]
    fn test_error_tally() {
        let tally = ErrorTally::default();
        tally.increment();
        tally.increment();
        assert_eq!(tally.get(), 2);
    }

    #[test]
    fn test_concurrent_readers_never_see_partial_family() {
        use std::sync::Arc;
        use std::thread;

        let metrics = Arc::new(OvnMetrics::new().unwrap());
        let rows: Vec<Sample> = (0..50)
            .map(|i| sample([format!("ls-{i}"), format!("net{i}")], 1.0))
            .collect();
        metrics.logical_switch_info.publish(rows.clone());

        let writer = {
            let metrics = Arc::clone(&metrics);
            thread::spawn(move || {
                for _ in 0..200 {
                    metrics.logical_switch_info.publish(rows.clone());
                }
            })
        };

        for _ in 0..200 {
            assert_eq!(metrics.logical_switch_info.series_count(), 50);
        }
        writer.join().unwrap();
    }
}
