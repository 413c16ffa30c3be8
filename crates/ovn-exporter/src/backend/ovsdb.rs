//! [`OvnBackend`] over OVSDB JSON-RPC.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::jsonrpc::{
    column, integer, optional_string, select_params, select_rows, string_map, string_set,
    Session,
};
use super::{Chassis, ClusterRoleInfo, LogicalSwitch, LogicalSwitchPort, OvnBackend};
use crate::appctl::{CommandRunner, StatusQueries};
use crate::config::Config;
use crate::database::Database;
use crate::errors::BackendError;
use crate::parser::{cluster_role_value, parse_cluster_status};

type Row = Map<String, Value>;

struct Endpoint {
    database: Database,
    remote: String,
    control_socket: String,
    session: Mutex<Option<Session>>,
}

impl Endpoint {
    fn new(database: Database, remote: String, control_socket: String) -> Self {
        Self {
            database,
            remote,
            control_socket,
            session: Mutex::new(None),
        }
    }
}

/// OVSDB JSON-RPC client holding one session per database.
pub struct OvsdbClient {
    northbound: Endpoint,
    southbound: Endpoint,
    timeout: Duration,
    queries: StatusQueries,
    runner: Arc<dyn CommandRunner>,
}

impl OvsdbClient {
    /// Build a client from configuration. No connection is made until
    /// [`OvnBackend::connect`] or the first query.
    pub fn new(config: &Config, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            northbound: Endpoint::new(
                Database::Northbound,
                config.northbound.socket_remote.clone(),
                config.northbound.socket_control.clone(),
            ),
            southbound: Endpoint::new(
                Database::Southbound,
                config.southbound.socket_remote.clone(),
                config.southbound.socket_control.clone(),
            ),
            timeout: config.poll_timeout,
            queries: StatusQueries::new(&config.appctl_binary, &config.ovsdb_tool_binary),
            runner,
        }
    }

    fn endpoint(&self, database: Database) -> &Endpoint {
        match database {
            Database::Northbound => &self.northbound,
            Database::Southbound => &self.southbound,
        }
    }

    async fn dial(&self, endpoint: &Endpoint) -> Result<Session, BackendError> {
        let mut session = tokio::time::timeout(self.timeout, Session::dial(&endpoint.remote))
            .await
            .map_err(|_| BackendError::Timeout(self.timeout))??;

        let dbs = tokio::time::timeout(self.timeout, session.call("list_dbs", json!([])))
            .await
            .map_err(|_| BackendError::Timeout(self.timeout))??;

        let served = dbs
            .as_array()
            .is_some_and(|names| names.iter().any(|n| n.as_str() == Some(endpoint.database.name())));
        if !served {
            return Err(BackendError::Rpc(format!(
                "{} does not serve {}",
                endpoint.remote, endpoint.database
            )));
        }

        Ok(session)
    }

    /// Issue one request, re-dialing once if the session was dropped.
    async fn request(
        &self,
        database: Database,
        method: &str,
        params: Value,
    ) -> Result<Value, BackendError> {
        let endpoint = self.endpoint(database);
        let mut guard = endpoint.session.lock().await;

        if guard.is_none() {
            match self.dial(endpoint).await {
                Ok(session) => {
                    info!(target: "ovn.connection", database = %database, "Re-established session");
                    *guard = Some(session);
                }
                Err(e) => {
                    debug!(target: "ovn.connection", database = %database, error = %e, "Re-dial failed");
                    return Err(BackendError::NotConnected(database));
                }
            }
        }

        let Some(session) = guard.as_mut() else {
            return Err(BackendError::NotConnected(database));
        };

        match tokio::time::timeout(self.timeout, session.call(method, params)).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => {
                if matches!(e, BackendError::Transport(_) | BackendError::Malformed(_)) {
                    warn!(target: "ovn.connection", database = %database, error = %e, "Dropping session");
                    *guard = None;
                }
                Err(e)
            }
            Err(_) => {
                // A late reply would desynchronize the stream
                *guard = None;
                Err(BackendError::Timeout(self.timeout))
            }
        }
    }

    async fn select(
        &self,
        database: Database,
        table: &str,
        columns: &[&str],
    ) -> Result<Vec<Row>, BackendError> {
        let result = self
            .request(database, "transact", select_params(database.name(), table, columns))
            .await?;
        select_rows(result)
    }
}

fn uuid_of(row: &Row) -> String {
    optional_string(column(row, "_uuid"))
}

#[async_trait]
impl OvnBackend for OvsdbClient {
    async fn connect(&self) -> Result<(), BackendError> {
        let northbound = self.dial(&self.northbound).await?;
        let southbound = self.dial(&self.southbound).await?;

        *self.northbound.session.lock().await = Some(northbound);
        *self.southbound.session.lock().await = Some(southbound);
        Ok(())
    }

    async fn list_chassis(&self) -> Result<Vec<Chassis>, BackendError> {
        let encaps: HashMap<String, String> = self
            .select(Database::Southbound, "Encap", &["_uuid", "ip"])
            .await?
            .iter()
            .map(|row| (uuid_of(row), optional_string(column(row, "ip"))))
            .collect();

        let chassis = self
            .select(
                Database::Southbound,
                "Chassis",
                &["_uuid", "hostname", "name", "encaps"],
            )
            .await?;

        Ok(chassis
            .iter()
            .map(|row| {
                let ip_address = string_set(column(row, "encaps"))
                    .first()
                    .and_then(|encap| encaps.get(encap))
                    .cloned()
                    .unwrap_or_default();
                Chassis {
                    hostname: optional_string(column(row, "hostname")),
                    uuid: uuid_of(row),
                    name: optional_string(column(row, "name")),
                    ip_address,
                }
            })
            .collect())
    }

    async fn list_logical_switches(&self) -> Result<Vec<LogicalSwitch>, BackendError> {
        let switches = self
            .select(
                Database::Northbound,
                "Logical_Switch",
                &["_uuid", "name", "ports", "external_ids"],
            )
            .await?;

        let tunnel_keys: HashMap<String, u64> = self
            .select(
                Database::Southbound,
                "Datapath_Binding",
                &["_uuid", "external_ids", "tunnel_key"],
            )
            .await?
            .iter()
            .filter_map(|row| {
                string_map(column(row, "external_ids"))
                    .remove("logical-switch")
                    .map(|ls| (ls, integer(column(row, "tunnel_key"))))
            })
            .collect();

        Ok(switches
            .iter()
            .map(|row| {
                let uuid = uuid_of(row);
                LogicalSwitch {
                    tunnel_key: tunnel_keys.get(&uuid).copied().unwrap_or(0),
                    name: optional_string(column(row, "name")),
                    ports: string_set(column(row, "ports")),
                    external_ids: string_map(column(row, "external_ids")),
                    uuid,
                }
            })
            .collect())
    }

    async fn list_logical_switch_ports(&self) -> Result<Vec<LogicalSwitchPort>, BackendError> {
        let switch_of_port: HashMap<String, String> = self
            .select(Database::Northbound, "Logical_Switch", &["_uuid", "name", "ports"])
            .await?
            .iter()
            .flat_map(|row| {
                let name = optional_string(column(row, "name"));
                string_set(column(row, "ports"))
                    .into_iter()
                    .map(move |port| (port, name.clone()))
            })
            .collect();

        let ports = self
            .select(
                Database::Northbound,
                "Logical_Switch_Port",
                &["_uuid", "name", "addresses"],
            )
            .await?;

        let bindings: HashMap<String, Row> = self
            .select(
                Database::Southbound,
                "Port_Binding",
                &["_uuid", "logical_port", "chassis", "datapath", "tunnel_key"],
            )
            .await?
            .into_iter()
            .map(|row| (optional_string(column(&row, "logical_port")), row))
            .collect();

        Ok(ports
            .iter()
            .map(|row| {
                let uuid = uuid_of(row);
                let name = optional_string(column(row, "name"));
                let binding = bindings.get(&name);
                let from_binding =
                    |col: &str| binding.map(|b| optional_string(column(b, col))).unwrap_or_default();

                LogicalSwitchPort {
                    switch_name: switch_of_port.get(&uuid).cloned().unwrap_or_default(),
                    chassis_id: from_binding("chassis"),
                    datapath_id: from_binding("datapath"),
                    port_binding_id: binding.map(uuid_of).unwrap_or_default(),
                    tunnel_key: binding
                        .map(|b| integer(column(b, "tunnel_key")))
                        .unwrap_or(0),
                    addresses: string_set(column(row, "addresses")),
                    uuid,
                    name,
                }
            })
            .collect())
    }

    async fn cluster_role_info(&self, app_name: &str) -> Result<ClusterRoleInfo, BackendError> {
        let database = Database::from_app_name(app_name)
            .ok_or_else(|| BackendError::Rpc(format!("no cluster status for {app_name}")))?;

        let output = self
            .queries
            .cluster_status(
                self.runner.as_ref(),
                &self.endpoint(database).control_socket,
                database,
            )
            .await?;

        let status = parse_cluster_status(&output);
        Ok(ClusterRoleInfo {
            role: cluster_role_value(&status.role),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::backend::jsonrpc::Framer;
    use crate::errors::CommandError;
    use std::collections::HashMap as Vars;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    struct FixedRunner(String);

    #[async_trait]
    impl CommandRunner for FixedRunner {
        async fn run(&self, _program: &str, _args: &[String]) -> Result<String, CommandError> {
            Ok(self.0.clone())
        }
    }

    fn client(runner_output: &str) -> OvsdbClient {
        let mut vars = Vars::new();
        vars.insert(
            "OVN_NB_SOCKET_REMOTE".to_string(),
            "unix:/nonexistent/ovnnb_db.sock".to_string(),
        );
        vars.insert(
            "OVN_SB_SOCKET_REMOTE".to_string(),
            "unix:/nonexistent/ovnsb_db.sock".to_string(),
        );
        let config = Config::from_vars(&vars).unwrap();
        OvsdbClient::new(&config, Arc::new(FixedRunner(runner_output.to_string())))
    }

    #[tokio::test]
    async fn test_cluster_role_info_maps_role() {
        let client = client("Role: leader\nTerm: 4\n");
        let info = client.cluster_role_info("ovsdb-server-northbound").await.unwrap();
        assert_eq!(info.role, 3);

        let client = self::client("Role: follower\n");
        let info = client.cluster_role_info("ovsdb-server-southbound").await.unwrap();
        assert_eq!(info.role, 1);
    }

    #[tokio::test]
    async fn test_cluster_role_info_unknown_app() {
        let client = client("Role: leader\n");
        assert!(client.cluster_role_info("ovn-northd").await.is_err());
    }

    #[tokio::test]
    async fn test_connect_fails_without_server() {
        let client = client("");
        assert!(client.connect().await.is_err());
    }

    #[tokio::test]
    async fn test_query_without_server_is_not_connected() {
        let client = client("");
        let err = client.list_chassis().await.unwrap_err();
        assert!(matches!(err, BackendError::NotConnected(Database::Southbound)));
    }

    // ========================================================================
    // Joins against in-memory ovsdb-servers
    // ========================================================================

    /// Session to a server answering every `select` with the rows stored
    /// for its table, or no rows for an unknown table.
    fn serve_tables(tables: Vec<(&'static str, Value)>) -> Session {
        let tables: HashMap<&'static str, Value> = tables.into_iter().collect();
        let (client_half, mut server) = duplex(64 * 1024);

        tokio::spawn(async move {
            let mut framer = Framer::default();
            let mut chunk = [0u8; 4096];
            loop {
                let request = loop {
                    if let Some(message) = framer.next_message().unwrap() {
                        break message;
                    }
                    let n = server.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        return;
                    }
                    framer.extend(chunk.get(..n).unwrap());
                };

                let table = request["params"][1]["table"].as_str().unwrap_or_default();
                let rows = tables.get(table).cloned().unwrap_or_else(|| json!([]));
                let reply = json!({ "id": request["id"], "result": [{ "rows": rows }], "error": null });
                if server.write_all(&serde_json::to_vec(&reply).unwrap()).await.is_err() {
                    return;
                }
            }
        });

        Session::new(Box::new(client_half))
    }

    async fn connected_client(
        northbound: Vec<(&'static str, Value)>,
        southbound: Vec<(&'static str, Value)>,
    ) -> OvsdbClient {
        let client = client("");
        *client.northbound.session.lock().await = Some(serve_tables(northbound));
        *client.southbound.session.lock().await = Some(serve_tables(southbound));
        client
    }

    #[tokio::test]
    async fn test_list_chassis_resolves_encap_ip() {
        let client = connected_client(
            vec![],
            vec![
                (
                    "Encap",
                    json!([
                        { "_uuid": ["uuid", "e1"], "ip": "192.0.2.11" },
                        { "_uuid": ["uuid", "e2"], "ip": "192.0.2.12" },
                    ]),
                ),
                (
                    "Chassis",
                    json!([
                        {
                            "_uuid": ["uuid", "c1"],
                            "hostname": "node-1.example.com",
                            "name": "node-1",
                            // A set of one arrives as the bare atom
                            "encaps": ["uuid", "e1"],
                        },
                        {
                            "_uuid": ["uuid", "c2"],
                            "hostname": "node-2.example.com",
                            "name": "node-2",
                            "encaps": ["set", [["uuid", "e2"], ["uuid", "e1"]]],
                        },
                        {
                            "_uuid": ["uuid", "c3"],
                            "hostname": "node-3.example.com",
                            "name": "node-3",
                            "encaps": ["set", []],
                        },
                    ]),
                ),
            ],
        )
        .await;

        let chassis = client.list_chassis().await.unwrap();

        assert_eq!(
            chassis,
            vec![
                Chassis {
                    hostname: "node-1.example.com".to_string(),
                    uuid: "c1".to_string(),
                    name: "node-1".to_string(),
                    ip_address: "192.0.2.11".to_string(),
                },
                Chassis {
                    hostname: "node-2.example.com".to_string(),
                    uuid: "c2".to_string(),
                    name: "node-2".to_string(),
                    ip_address: "192.0.2.12".to_string(),
                },
                Chassis {
                    hostname: "node-3.example.com".to_string(),
                    uuid: "c3".to_string(),
                    name: "node-3".to_string(),
                    ip_address: String::new(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_list_logical_switches_joins_datapath_tunnel_key() {
        let client = connected_client(
            vec![(
                "Logical_Switch",
                json!([
                    {
                        "_uuid": ["uuid", "ls-1"],
                        "name": "net-a",
                        "ports": ["set", [["uuid", "p1"], ["uuid", "p2"]]],
                        "external_ids": ["map", [["neutron:network_name", "a"]]],
                    },
                    {
                        "_uuid": ["uuid", "ls-2"],
                        "name": "net-b",
                        "ports": ["set", []],
                        "external_ids": ["map", []],
                    },
                ]),
            )],
            vec![(
                "Datapath_Binding",
                json!([
                    {
                        "_uuid": ["uuid", "dp-1"],
                        "external_ids": ["map", [["logical-switch", "ls-1"], ["name", "net-a"]]],
                        "tunnel_key": 5,
                    },
                    {
                        "_uuid": ["uuid", "dp-router"],
                        "external_ids": ["map", [["logical-router", "lr-1"]]],
                        "tunnel_key": 9,
                    },
                ]),
            )],
        )
        .await;

        let switches = client.list_logical_switches().await.unwrap();

        assert_eq!(switches.len(), 2);
        let net_a = switches.first().unwrap();
        assert_eq!(net_a.uuid, "ls-1");
        assert_eq!(net_a.name, "net-a");
        assert_eq!(net_a.ports, vec!["p1".to_string(), "p2".to_string()]);
        assert_eq!(
            net_a.external_ids.get("neutron:network_name").map(String::as_str),
            Some("a")
        );
        assert_eq!(net_a.tunnel_key, 5);

        // No datapath yet
        let net_b = switches.get(1).unwrap();
        assert_eq!(net_b.uuid, "ls-2");
        assert!(net_b.ports.is_empty());
        assert!(net_b.external_ids.is_empty());
        assert_eq!(net_b.tunnel_key, 0);
    }

    #[tokio::test]
    async fn test_list_logical_switch_ports_joins_switch_and_binding() {
        let client = connected_client(
            vec![
                (
                    "Logical_Switch",
                    json!([
                        { "_uuid": ["uuid", "ls-1"], "name": "net-a", "ports": ["uuid", "p1"] },
                    ]),
                ),
                (
                    "Logical_Switch_Port",
                    json!([
                        {
                            "_uuid": ["uuid", "p1"],
                            "name": "vm-1",
                            "addresses": "fa:16:3e:00:00:01 10.0.0.5",
                        },
                        {
                            "_uuid": ["uuid", "p2"],
                            "name": "vm-2",
                            "addresses": ["set", []],
                        },
                    ]),
                ),
            ],
            vec![(
                "Port_Binding",
                json!([
                    {
                        "_uuid": ["uuid", "pb-1"],
                        "logical_port": "vm-1",
                        "chassis": ["uuid", "c1"],
                        "datapath": ["uuid", "dp-1"],
                        "tunnel_key": 2,
                    },
                ]),
            )],
        )
        .await;

        let ports = client.list_logical_switch_ports().await.unwrap();

        assert_eq!(
            ports,
            vec![
                LogicalSwitchPort {
                    uuid: "p1".to_string(),
                    name: "vm-1".to_string(),
                    chassis_id: "c1".to_string(),
                    switch_name: "net-a".to_string(),
                    datapath_id: "dp-1".to_string(),
                    port_binding_id: "pb-1".to_string(),
                    addresses: vec!["fa:16:3e:00:00:01 10.0.0.5".to_string()],
                    tunnel_key: 2,
                },
                // Neither attached to a switch nor bound
                LogicalSwitchPort {
                    uuid: "p2".to_string(),
                    name: "vm-2".to_string(),
                    ..LogicalSwitchPort::default()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_select_error_is_reported_and_session_kept() {
        let client = client("");
        *client.southbound.session.lock().await = Some({
            let (client_half, mut server) = duplex(4096);
            tokio::spawn(async move {
                let mut framer = Framer::default();
                let mut chunk = [0u8; 1024];
                loop {
                    let n = server.read(&mut chunk).await.unwrap_or(0);
                    if n == 0 {
                        return;
                    }
                    framer.extend(chunk.get(..n).unwrap());
                    while let Some(request) = framer.next_message().unwrap() {
                        let reply = json!({
                            "id": request["id"],
                            "result": [{ "error": "unknown table", "details": "no table named Encap" }],
                            "error": null,
                        });
                        let _ = server.write_all(&serde_json::to_vec(&reply).unwrap()).await;
                    }
                }
            });
            Session::new(Box::new(client_half))
        });

        let err = client.list_chassis().await.unwrap_err();

        assert!(matches!(err, BackendError::Rpc(ref msg) if msg.contains("unknown table")));
        assert!(client.southbound.session.lock().await.is_some());
    }
}
