//! Parsers for `ovn-appctl` text output.
//!
//! Everything here is pure: raw command output in, typed values out. The
//! output format is loosely structured (`Key: value` lines, free text in
//! between), so parsing is deliberately forgiving. Unknown keys are skipped
//! and a malformed numeric field is left at zero instead of failing the
//! whole record.

/// Peer connection counts from the `Connections:` line of `cluster/status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionCounts {
    pub inbound: u64,
    pub outbound: u64,
    pub inbound_errors: u64,
    pub outbound_errors: u64,
}

/// Raft state of one database server, as reported by `cluster/status`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterStatus {
    pub cluster_id: String,
    pub server_id: String,
    pub status: String,
    pub role: String,
    pub leader: String,
    pub vote: String,
    pub term: u64,
    pub election_timer: u64,
    pub log_index_start: u64,
    pub log_index_next: u64,
    pub entries_not_committed: u64,
    pub entries_not_applied: u64,
    pub connections: ConnectionCounts,
}

impl ClusterStatus {
    /// This server is the cluster leader.
    #[must_use]
    pub fn is_leader_self(&self) -> bool {
        self.leader == "self"
    }

    /// This server voted for itself in the current term.
    #[must_use]
    pub fn is_vote_self(&self) -> bool {
        self.vote == "self"
    }
}

/// Parse the output of `ovn-appctl -t <ctl> cluster/status <DB>`.
///
/// Example input:
///
/// ```text
/// 45ef
/// Name: OVN_Northbound
/// Cluster ID: 45ef (45ef51b9-9401-46e7-810d-6db0fc344ea2)
/// Server ID: 45ef (45ef51b9-9401-46e7-810d-6db0fc344ea2)
/// Status: cluster member
/// Role: leader
/// Term: 4
/// Leader: self
/// Vote: self
/// Election timer: 1000
/// Log: [2, 1108]
/// Entries not yet committed: 0
/// Entries not yet applied: 0
/// Connections: ->0000 (->56d7) <-46ac <-56d7
/// ```
#[must_use]
pub fn parse_cluster_status(output: &str) -> ClusterStatus {
    let mut status = ClusterStatus::default();

    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();

        match key.trim() {
            "Cluster ID" => status.cluster_id = parenthesized_id(value),
            "Server ID" => status.server_id = parenthesized_id(value),
            "Status" => status.status = value.to_string(),
            "Role" => status.role = value.to_string(),
            "Term" => status.term = number_or_zero(value),
            "Leader" => status.leader = value.to_string(),
            "Vote" => status.vote = value.to_string(),
            "Election timer" => status.election_timer = number_or_zero(value),
            "Log" => {
                let (start, next) = log_bounds(value);
                status.log_index_start = start;
                status.log_index_next = next;
            }
            "Entries not yet committed" => status.entries_not_committed = number_or_zero(value),
            "Entries not yet applied" => status.entries_not_applied = number_or_zero(value),
            "Connections" => status.connections = parse_connections(value),
            _ => {}
        }
    }

    status
}

/// Count peer connections by direction and error state.
///
/// Tokens look like `->0000`, `(->56d7)`, `<-46ac`, `(<-1234)`. A leading
/// parenthesis marks a connection in error.
#[must_use]
pub fn parse_connections(value: &str) -> ConnectionCounts {
    let mut counts = ConnectionCounts::default();

    for token in value.split_whitespace() {
        if token.starts_with("->") {
            counts.outbound += 1;
        } else if token.starts_with("<-") {
            counts.inbound += 1;
        } else if token.starts_with("(->") {
            counts.outbound_errors += 1;
        } else if token.starts_with("(<-") {
            counts.inbound_errors += 1;
        }
    }

    counts
}

/// Extract the full UUID from `45ef (45ef51b9-9401-46e7-810d-6db0fc344ea2)`.
///
/// Falls back to the short id when there is no parenthesized form.
fn parenthesized_id(value: &str) -> String {
    let mut tokens = value.split_whitespace();
    let short = tokens.next().unwrap_or_default();
    tokens
        .next()
        .unwrap_or(short)
        .trim_matches(|c| c == '(' || c == ')')
        .to_string()
}

/// Decode `[start, next]`.
fn log_bounds(value: &str) -> (u64, u64) {
    let inner = value.trim_matches(|c| c == '[' || c == ']');
    let mut bounds = inner.split(',');
    let start = bounds.next().map(number_or_zero).unwrap_or_default();
    let next = bounds.next().map(number_or_zero).unwrap_or_default();
    (start, next)
}

fn number_or_zero(value: &str) -> u64 {
    value.trim().parse().unwrap_or_default()
}

/// Interpret `ovsdb-server/get-db-storage-status` output.
///
/// The first line containing `status: ok` or `ovsdb error` decides. Output
/// with neither marker is reported as not OK, indistinguishable from an
/// explicit storage error.
#[must_use]
pub fn parse_storage_status(output: &str) -> bool {
    for line in output.lines() {
        if line.contains("status: ok") {
            return true;
        }
        if line.contains("ovsdb error") {
            return false;
        }
    }
    false
}

/// Text following `Servers:` in `cluster/status` output, if present.
#[must_use]
pub fn cluster_servers(output: &str) -> Option<&str> {
    output.split("Servers:").nth(1)
}

/// Active/standby state of ovn-northd.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NorthdStatus {
    Active,
    Standby,
    Unknown,
}

impl NorthdStatus {
    /// Gauge value for the `ovn_status` family.
    #[must_use]
    pub const fn value(&self) -> u8 {
        match self {
            NorthdStatus::Active => 3,
            NorthdStatus::Standby => 1,
            NorthdStatus::Unknown => 0,
        }
    }
}

/// Interpret `ovn-appctl -t <northd ctl> status` output (`Status: active`).
///
/// Anything other than exactly one colon-separated pair is `Unknown`.
#[must_use]
pub fn parse_northd_status(output: &str) -> NorthdStatus {
    let parts: Vec<&str> = output.split(':').collect();
    let [_, state] = parts.as_slice() else {
        return NorthdStatus::Unknown;
    };

    match state.trim() {
        "active" => NorthdStatus::Active,
        "standby" => NorthdStatus::Standby,
        _ => NorthdStatus::Unknown,
    }
}

/// Gauge value for a database server's Raft role.
#[must_use]
pub fn cluster_role_value(role: &str) -> u8 {
    match role {
        "leader" => 3,
        "candidate" => 2,
        "follower" => 1,
        _ => 0,
    }
}

/// ovn-northd control socket derived from its PID file contents.
#[must_use]
pub fn northd_socket_from_pid(pid_file_contents: &str) -> String {
    format!(
        "/var/run/ovn/ovn-northd.{}.ctl",
        pid_file_contents.trim_matches('\n')
    )
}
