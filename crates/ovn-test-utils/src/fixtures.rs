//! Canned command output, inventory builders and a temp-file backed config.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use ovn_exporter::backend::{Chassis, LogicalSwitch, LogicalSwitchPort};
use ovn_exporter::config::Config;
use ovn_exporter::observability::OvnMetrics;
use ovn_exporter::tasks::Poller;
use tempfile::TempDir;

use crate::{MockBackend, ScriptedRunner};

/// PID written to the ovn-northd PID file by [`TestEnv`].
pub const NORTHD_PID: &str = "4242";

/// Size of the northbound database file created by [`TestEnv`].
pub const NB_DB_SIZE: usize = 1024;

/// Size of the southbound database file created by [`TestEnv`].
pub const SB_DB_SIZE: usize = 2048;

// Command-line fragments understood by `ScriptedRunner`
pub const NB_CLUSTER_STATUS_CMD: &str = "cluster/status OVN_Northbound";
pub const SB_CLUSTER_STATUS_CMD: &str = "cluster/status OVN_Southbound";
pub const NB_STORAGE_STATUS_CMD: &str = "get-db-storage-status OVN_Northbound";
pub const SB_STORAGE_STATUS_CMD: &str = "get-db-storage-status OVN_Southbound";
pub const NORTHD_STATUS_CMD: &str = "ovn-northd.4242.ctl status";
pub const DB_IS_CLUSTERED_CMD: &str = "db-is-clustered";

pub const NB_CLUSTER_STATUS: &str = "45ef
Name: OVN_Northbound
Cluster ID: 45ef (45ef51b9-9401-46e7-810d-6db0fc344ea2)
Server ID: 1a2b (1a2b3c4d-5e6f-4a7b-8c9d-0e1f2a3b4c5d)
Address: tcp:10.0.0.1:6643
Status: cluster member
Role: leader
Term: 7
Leader: self
Vote: self

Last Election started 2391 ms ago, reason: timeout
Election timer: 1000
Log: [12, 47]
Entries not yet committed: 0
Entries not yet applied: 0
Connections: ->0000 (->56d7) <-46ac (<-1234)
Disconnections: 0
Servers:
    1a2b (1a2b at tcp:10.0.0.1:6643) (self) next_index=12 match_index=46
    56d7 (56d7 at tcp:10.0.0.2:6643) next_index=47 match_index=46
";

pub const SB_CLUSTER_STATUS: &str = "9c01
Name: OVN_Southbound
Cluster ID: 9c01 (9c01aa00-1111-4222-8333-444455556666)
Server ID: 7e7e (7e7e0000-aaaa-4bbb-8ccc-dddddddddddd)
Address: tcp:10.0.0.1:6644
Status: cluster member
Role: follower
Term: 3
Leader: 56d7
Vote: 56d7

Election timer: 1000
Log: [2, 1108]
Entries not yet committed: 0
Entries not yet applied: 1
Connections:
Disconnections: 1
Servers:
    7e7e (7e7e at tcp:10.0.0.1:6644) (self)
    56d7 (56d7 at tcp:10.0.0.2:6644)
";

pub const STORAGE_STATUS_OK: &str = "status: ok\n";

pub const STORAGE_STATUS_ERROR: &str =
    "status: ovsdb error: /etc/ovn/ovnsb_db.db: cannot identify file type\n";

pub const NORTHD_STATUS_ACTIVE: &str = "Status: active\n";

pub const NORTHD_STATUS_STANDBY: &str = "Status: standby\n";

pub fn chassis(name: &str) -> Chassis {
    Chassis {
        hostname: format!("{name}.example.com"),
        uuid: format!("uuid-{name}"),
        name: name.to_string(),
        ip_address: "192.0.2.10".to_string(),
    }
}

pub fn logical_switch(uuid: &str, name: &str, ports: &[&str]) -> LogicalSwitch {
    LogicalSwitch {
        uuid: uuid.to_string(),
        name: name.to_string(),
        ports: ports.iter().map(|p| (*p).to_string()).collect(),
        external_ids: BTreeMap::from([(
            "neutron:network_name".to_string(),
            name.to_string(),
        )]),
        tunnel_key: 1,
    }
}

pub fn switch_port(uuid: &str, name: &str, switch_name: &str) -> LogicalSwitchPort {
    LogicalSwitchPort {
        uuid: uuid.to_string(),
        name: name.to_string(),
        chassis_id: "uuid-node-1".to_string(),
        switch_name: switch_name.to_string(),
        datapath_id: "dp-1".to_string(),
        port_binding_id: format!("pb-{uuid}"),
        addresses: vec!["fa:16:3e:00:00:01 10.0.0.5".to_string()],
        tunnel_key: 2,
    }
}

/// Temp directory holding both database files and the ovn-northd PID file,
/// plus a [`Config`] pointing at them.
pub struct TestEnv {
    dir: TempDir,
    pub config: Config,
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_vars(&[])
    }

    /// Like [`TestEnv::new`] with extra environment variables applied.
    pub fn with_vars(extra: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let nb = dir.path().join("ovnnb_db.db");
        let sb = dir.path().join("ovnsb_db.db");
        let pid = dir.path().join("ovn-northd.pid");
        std::fs::write(&nb, vec![b'x'; NB_DB_SIZE]).unwrap();
        std::fs::write(&sb, vec![b'x'; SB_DB_SIZE]).unwrap();
        std::fs::write(&pid, format!("{NORTHD_PID}\n")).unwrap();

        let mut vars: HashMap<String, String> = HashMap::from([
            (
                "OVN_NB_FILE_DATA_PATH".to_string(),
                nb.display().to_string(),
            ),
            (
                "OVN_SB_FILE_DATA_PATH".to_string(),
                sb.display().to_string(),
            ),
            (
                "OVN_NORTHD_FILE_PID_PATH".to_string(),
                pid.display().to_string(),
            ),
        ]);
        for (k, v) in extra {
            vars.insert((*k).to_string(), (*v).to_string());
        }

        let config = Config::from_vars(&vars).unwrap();
        Self { dir, config }
    }

    pub fn nb_db_path(&self) -> PathBuf {
        self.dir.path().join("ovnnb_db.db")
    }

    pub fn sb_db_path(&self) -> PathBuf {
        self.dir.path().join("ovnsb_db.db")
    }

    /// Build a poller over the given mocks.
    pub fn poller(
        &self,
        backend: Arc<MockBackend>,
        runner: Arc<ScriptedRunner>,
        metrics: Arc<OvnMetrics>,
    ) -> Poller {
        Poller::new(Arc::new(self.config.clone()), backend, runner, metrics)
    }
}
