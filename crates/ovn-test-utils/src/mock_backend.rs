//! In-memory OVN backend.
//!
//! Every query answers from state set by the test, which can be changed
//! between passes to simulate objects appearing, disappearing or failing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use ovn_exporter::backend::{
    Chassis, ClusterRoleInfo, LogicalSwitch, LogicalSwitchPort, OvnBackend,
};
use ovn_exporter::errors::BackendError;

/// Planned connect behavior.
#[derive(Debug, Clone, Copy)]
enum ConnectPlan {
    Succeed,
    FailTimes(u32),
    AlwaysFail,
}

#[derive(Debug)]
struct State {
    connect: ConnectPlan,
    chassis: Result<Vec<Chassis>, String>,
    switches: Result<Vec<LogicalSwitch>, String>,
    ports: Result<Vec<LogicalSwitchPort>, String>,
    roles: HashMap<String, u8>,
}

/// Mock [`OvnBackend`].
#[derive(Debug)]
pub struct MockBackend {
    state: Mutex<State>,
    connect_attempts: AtomicU32,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Connects successfully and reports empty inventory.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                connect: ConnectPlan::Succeed,
                chassis: Ok(Vec::new()),
                switches: Ok(Vec::new()),
                ports: Ok(Vec::new()),
                roles: HashMap::new(),
            }),
            connect_attempts: AtomicU32::new(0),
        }
    }

    /// Fail the first `n` connect calls, then succeed.
    pub fn fail_connect_times(self, n: u32) -> Self {
        self.state.lock().unwrap().connect = ConnectPlan::FailTimes(n);
        self
    }

    /// Fail every connect call.
    pub fn always_fail_connect(self) -> Self {
        self.state.lock().unwrap().connect = ConnectPlan::AlwaysFail;
        self
    }

    pub fn with_chassis(self, chassis: Vec<Chassis>) -> Self {
        self.set_chassis(chassis);
        self
    }

    pub fn with_logical_switches(self, switches: Vec<LogicalSwitch>) -> Self {
        self.set_logical_switches(switches);
        self
    }

    pub fn with_ports(self, ports: Vec<LogicalSwitchPort>) -> Self {
        self.set_ports(ports);
        self
    }

    /// Role value reported for `app_name`.
    pub fn with_role(self, app_name: &str, role: u8) -> Self {
        self.state
            .lock()
            .unwrap()
            .roles
            .insert(app_name.to_string(), role);
        self
    }

    pub fn set_chassis(&self, chassis: Vec<Chassis>) {
        self.state.lock().unwrap().chassis = Ok(chassis);
    }

    pub fn set_logical_switches(&self, switches: Vec<LogicalSwitch>) {
        self.state.lock().unwrap().switches = Ok(switches);
    }

    pub fn set_ports(&self, ports: Vec<LogicalSwitchPort>) {
        self.state.lock().unwrap().ports = Ok(ports);
    }

    pub fn fail_chassis(&self) {
        self.state.lock().unwrap().chassis = Err("chassis query failed".to_string());
    }

    pub fn fail_logical_switches(&self) {
        self.state.lock().unwrap().switches = Err("logical switch query failed".to_string());
    }

    pub fn fail_ports(&self) {
        self.state.lock().unwrap().ports = Err("port query failed".to_string());
    }

    /// Number of `connect` calls so far.
    pub fn connect_attempts(&self) -> u32 {
        self.connect_attempts.load(Ordering::SeqCst)
    }
}

fn answer<T: Clone>(result: &Result<T, String>) -> Result<T, BackendError> {
    result.clone().map_err(BackendError::Rpc)
}

#[async_trait]
impl OvnBackend for MockBackend {
    async fn connect(&self) -> Result<(), BackendError> {
        let attempt = self.connect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let plan = self.state.lock().unwrap().connect;
        match plan {
            ConnectPlan::Succeed => Ok(()),
            ConnectPlan::FailTimes(n) if attempt > n => Ok(()),
            ConnectPlan::FailTimes(_) | ConnectPlan::AlwaysFail => Err(BackendError::Transport(
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "mock refused"),
            )),
        }
    }

    async fn list_chassis(&self) -> Result<Vec<Chassis>, BackendError> {
        answer(&self.state.lock().unwrap().chassis)
    }

    async fn list_logical_switches(&self) -> Result<Vec<LogicalSwitch>, BackendError> {
        answer(&self.state.lock().unwrap().switches)
    }

    async fn list_logical_switch_ports(&self) -> Result<Vec<LogicalSwitchPort>, BackendError> {
        answer(&self.state.lock().unwrap().ports)
    }

    async fn cluster_role_info(&self, app_name: &str) -> Result<ClusterRoleInfo, BackendError> {
        let role = self
            .state
            .lock()
            .unwrap()
            .roles
            .get(app_name)
            .copied()
            .unwrap_or(0);
        Ok(ClusterRoleInfo { role })
    }
}
