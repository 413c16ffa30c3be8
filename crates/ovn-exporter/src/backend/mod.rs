//! Typed access to the OVN databases.
//!
//! The collectors depend only on [`OvnBackend`]; [`OvsdbClient`] is the
//! production implementation and `ovn-test-utils` provides a mock.

mod jsonrpc;
mod ovsdb;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::errors::BackendError;

pub use ovsdb::OvsdbClient;

/// A hypervisor registered in the southbound `Chassis` table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chassis {
    pub hostname: String,
    pub uuid: String,
    pub name: String,
    pub ip_address: String,
}

/// A northbound logical switch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogicalSwitch {
    pub uuid: String,
    pub name: String,
    /// UUIDs of the switch's ports.
    pub ports: Vec<String>,
    pub external_ids: BTreeMap<String, String>,
    /// Tunnel key of the matching southbound datapath, 0 if unbound.
    pub tunnel_key: u64,
}

/// A northbound logical switch port joined with its southbound binding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogicalSwitchPort {
    pub uuid: String,
    pub name: String,
    pub chassis_id: String,
    pub switch_name: String,
    pub datapath_id: String,
    pub port_binding_id: String,
    pub addresses: Vec<String>,
    pub tunnel_key: u64,
}

impl LogicalSwitchPort {
    /// MAC and IP labels derived from the first address entry.
    #[must_use]
    pub fn mac_and_ip(&self) -> (String, String) {
        port_address(&self.addresses)
    }
}

/// Raft role of one database server, as a gauge value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClusterRoleInfo {
    /// 3 leader, 2 candidate, 1 follower, 0 unknown.
    pub role: u8,
}

/// Read-only queries against the OVN databases.
#[async_trait]
pub trait OvnBackend: Send + Sync {
    /// Establish sessions to both databases.
    async fn connect(&self) -> Result<(), BackendError>;

    async fn list_chassis(&self) -> Result<Vec<Chassis>, BackendError>;

    async fn list_logical_switches(&self) -> Result<Vec<LogicalSwitch>, BackendError>;

    async fn list_logical_switch_ports(&self) -> Result<Vec<LogicalSwitchPort>, BackendError>;

    /// Role of the database server identified by its application name
    /// (`ovsdb-server-northbound` or `ovsdb-server-southbound`).
    async fn cluster_role_info(&self, app_name: &str) -> Result<ClusterRoleInfo, BackendError>;
}

/// Decode a port's `addresses` column into `(mac, ip)` labels.
///
/// Only the first entry is considered. The keywords `router`, `unknown` and
/// `dynamic` stand for both labels.
#[must_use]
pub fn port_address(addresses: &[String]) -> (String, String) {
    let Some(first) = addresses.first() else {
        return (String::new(), String::new());
    };

    match first.as_str() {
        "router" | "unknown" | "dynamic" => (first.clone(), first.clone()),
        entry => {
            let mut parts = entry.split_whitespace();
            let mac = parts.next().unwrap_or_default().to_string();
            let ips = parts.collect::<Vec<_>>().join(" ");
            (mac, ips)
        }
    }
}
