//! OVN exporter configuration.
//!
//! Configuration is loaded from environment variables. Defaults match a
//! stock OVN installation (control sockets under `/run/ovn`, database files
//! under `/etc/ovn`).

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::database::Database;

/// Default HTTP listen address for metrics and health endpoints.
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:10661";

/// Default path under which metrics are exposed.
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

/// Default timeout for a single backend RPC or status command, in seconds.
pub const DEFAULT_POLL_TIMEOUT_SECONDS: u64 = 2;

/// Default interval between poll passes, in seconds.
pub const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 30;

/// Default ovn-northd PID file.
pub const DEFAULT_NORTHD_PID_PATH: &str = "/var/run/ovn/ovn-northd.pid";

/// Default `ovn-appctl` binary.
pub const DEFAULT_APPCTL_BINARY: &str = "ovn-appctl";

/// Default `ovsdb-tool` binary.
pub const DEFAULT_OVSDB_TOOL_BINARY: &str = "ovsdb-tool";

/// Socket and file locations for one OVN database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// JSON-RPC remote, e.g. `unix:/run/ovn/ovnnb_db.sock` or `tcp:10.0.0.1:6641`.
    pub socket_remote: String,

    /// `ovn-appctl` control socket path.
    pub socket_control: String,

    /// On-disk database file.
    pub file_data_path: String,
}

/// OVN exporter configuration.
#[derive(Clone)]
pub struct Config {
    /// HTTP listen address (default: "0.0.0.0:10661").
    pub listen_address: String,

    /// Metrics path (default: "/metrics").
    pub metrics_path: String,

    /// Whether the metrics route is mounted at all.
    pub enable_metrics: bool,

    /// Timeout applied to each backend RPC and status command.
    pub poll_timeout: Duration,

    /// Interval between poll passes.
    pub poll_interval: Duration,

    /// Northbound database locations.
    pub northbound: DatabaseConfig,

    /// Southbound database locations.
    pub southbound: DatabaseConfig,

    /// ovn-northd PID file, used when no control socket is configured.
    pub northd_pid_path: String,

    /// Explicit ovn-northd control socket.
    pub northd_socket_control: Option<String>,

    /// `ovn-appctl` binary name or path.
    pub appctl_binary: String,

    /// `ovsdb-tool` binary name or path.
    pub ovsdb_tool_binary: String,
}

impl Config {
    /// Locations for the given database.
    #[must_use]
    pub fn database(&self, database: Database) -> &DatabaseConfig {
        match database {
            Database::Northbound => &self.northbound,
            Database::Southbound => &self.southbound,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("listen_address", &self.listen_address)
            .field("metrics_path", &self.metrics_path)
            .field("enable_metrics", &self.enable_metrics)
            .field("poll_timeout_secs", &self.poll_timeout.as_secs())
            .field("poll_interval_secs", &self.poll_interval.as_secs())
            .field("northbound", &self.northbound)
            .field("southbound", &self.southbound)
            .field("northd_pid_path", &self.northd_pid_path)
            .field("northd_socket_control", &self.northd_socket_control)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let listen_address = string_or(vars, "OVN_EXPORTER_LISTEN_ADDRESS", DEFAULT_LISTEN_ADDRESS);

        let metrics_path = string_or(vars, "OVN_EXPORTER_METRICS_PATH", DEFAULT_METRICS_PATH);
        if !metrics_path.starts_with('/') {
            return Err(ConfigError::InvalidValue(format!(
                "OVN_EXPORTER_METRICS_PATH must start with '/', got '{metrics_path}'"
            )));
        }

        let enable_metrics = match vars.get("OVN_EXPORTER_ENABLE_METRICS") {
            Some(value) => value.parse::<bool>().map_err(|e| {
                ConfigError::InvalidValue(format!(
                    "OVN_EXPORTER_ENABLE_METRICS must be 'true' or 'false', got '{value}': {e}"
                ))
            })?,
            None => true,
        };

        let poll_timeout = Duration::from_secs(positive_seconds(
            vars,
            "OVN_EXPORTER_POLL_TIMEOUT_SECONDS",
            DEFAULT_POLL_TIMEOUT_SECONDS,
        )?);

        let poll_interval = Duration::from_secs(positive_seconds(
            vars,
            "OVN_EXPORTER_POLL_INTERVAL_SECONDS",
            DEFAULT_POLL_INTERVAL_SECONDS,
        )?);

        let northbound = DatabaseConfig {
            socket_remote: string_or(vars, "OVN_NB_SOCKET_REMOTE", "unix:/run/ovn/ovnnb_db.sock"),
            socket_control: string_or(vars, "OVN_NB_SOCKET_CONTROL", "/run/ovn/ovnnb_db.ctl"),
            file_data_path: string_or(vars, "OVN_NB_FILE_DATA_PATH", "/etc/ovn/ovnnb_db.db"),
        };

        let southbound = DatabaseConfig {
            socket_remote: string_or(vars, "OVN_SB_SOCKET_REMOTE", "unix:/run/ovn/ovnsb_db.sock"),
            socket_control: string_or(vars, "OVN_SB_SOCKET_CONTROL", "/run/ovn/ovnsb_db.ctl"),
            file_data_path: string_or(vars, "OVN_SB_FILE_DATA_PATH", "/etc/ovn/ovnsb_db.db"),
        };

        let northd_pid_path = string_or(vars, "OVN_NORTHD_FILE_PID_PATH", DEFAULT_NORTHD_PID_PATH);

        // An empty value means "derive from the PID file", same as unset
        let northd_socket_control = vars
            .get("OVN_NORTHD_SOCKET_CONTROL")
            .filter(|s| !s.is_empty())
            .cloned();

        let appctl_binary = string_or(vars, "OVN_APPCTL_BINARY", DEFAULT_APPCTL_BINARY);
        let ovsdb_tool_binary = string_or(vars, "OVN_OVSDB_TOOL_BINARY", DEFAULT_OVSDB_TOOL_BINARY);

        Ok(Config {
            listen_address,
            metrics_path,
            enable_metrics,
            poll_timeout,
            poll_interval,
            northbound,
            southbound,
            northd_pid_path,
            northd_socket_control,
            appctl_binary,
            ovsdb_tool_binary,
        })
    }
}

fn string_or(vars: &HashMap<String, String>, key: &str, default: &str) -> String {
    vars.get(key)
        .cloned()
        .unwrap_or_else(|| default.to_string())
}

fn positive_seconds(
    vars: &HashMap<String, String>,
    key: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    let Some(value_str) = vars.get(key) else {
        return Ok(default);
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidValue(format!(
            "{key} must be a valid positive integer, got '{value_str}': {e}"
        ))
    })?;

    if value == 0 {
        return Err(ConfigError::InvalidValue(format!(
            "{key} must be greater than 0"
        )));
    }

    Ok(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&HashMap::new()).expect("Config should load successfully");

        assert_eq!(config.listen_address, DEFAULT_LISTEN_ADDRESS);
        assert_eq!(config.metrics_path, DEFAULT_METRICS_PATH);
        assert!(config.enable_metrics);
        assert_eq!(config.poll_timeout, Duration::from_secs(2));
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.northbound.socket_remote, "unix:/run/ovn/ovnnb_db.sock");
        assert_eq!(config.northbound.socket_control, "/run/ovn/ovnnb_db.ctl");
        assert_eq!(config.northbound.file_data_path, "/etc/ovn/ovnnb_db.db");
        assert_eq!(config.southbound.socket_remote, "unix:/run/ovn/ovnsb_db.sock");
        assert_eq!(config.southbound.socket_control, "/run/ovn/ovnsb_db.ctl");
        assert_eq!(config.southbound.file_data_path, "/etc/ovn/ovnsb_db.db");
        assert_eq!(config.northd_pid_path, DEFAULT_NORTHD_PID_PATH);
        assert!(config.northd_socket_control.is_none());
        assert_eq!(config.appctl_binary, "ovn-appctl");
        assert_eq!(config.ovsdb_tool_binary, "ovsdb-tool");
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let vars = HashMap::from([
            ("OVN_EXPORTER_LISTEN_ADDRESS".to_string(), "127.0.0.1:9476".to_string()),
            ("OVN_EXPORTER_METRICS_PATH".to_string(), "/ovn".to_string()),
            ("OVN_EXPORTER_POLL_TIMEOUT_SECONDS".to_string(), "5".to_string()),
            ("OVN_EXPORTER_POLL_INTERVAL_SECONDS".to_string(), "15".to_string()),
            ("OVN_NB_SOCKET_REMOTE".to_string(), "tcp:10.0.0.1:6641".to_string()),
            ("OVN_SB_FILE_DATA_PATH".to_string(), "/data/sb.db".to_string()),
            ("OVN_NORTHD_SOCKET_CONTROL".to_string(), "/run/ovn/northd.ctl".to_string()),
        ]);

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.listen_address, "127.0.0.1:9476");
        assert_eq!(config.metrics_path, "/ovn");
        assert_eq!(config.poll_timeout, Duration::from_secs(5));
        assert_eq!(config.poll_interval, Duration::from_secs(15));
        assert_eq!(config.northbound.socket_remote, "tcp:10.0.0.1:6641");
        assert_eq!(config.southbound.file_data_path, "/data/sb.db");
        assert_eq!(
            config.northd_socket_control.as_deref(),
            Some("/run/ovn/northd.ctl")
        );
    }

    #[test]
    fn test_database_accessor() {
        let config = Config::from_vars(&HashMap::new()).unwrap();
        assert_eq!(
            config.database(Database::Northbound).socket_control,
            "/run/ovn/ovnnb_db.ctl"
        );
        assert_eq!(
            config.database(Database::Southbound).socket_control,
            "/run/ovn/ovnsb_db.ctl"
        );
    }

    #[test]
    fn test_empty_northd_socket_treated_as_unset() {
        let vars = HashMap::from([("OVN_NORTHD_SOCKET_CONTROL".to_string(), String::new())]);
        let config = Config::from_vars(&vars).unwrap();
        assert!(config.northd_socket_control.is_none());
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let vars = HashMap::from([(
            "OVN_EXPORTER_POLL_INTERVAL_SECONDS".to_string(),
            "0".to_string(),
        )]);
        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidValue(msg)) if msg.contains("greater than 0")));
    }

    #[test]
    fn test_non_numeric_timeout_rejected() {
        let vars = HashMap::from([(
            "OVN_EXPORTER_POLL_TIMEOUT_SECONDS".to_string(),
            "two".to_string(),
        )]);
        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_invalid_enable_metrics_rejected() {
        let vars = HashMap::from([(
            "OVN_EXPORTER_ENABLE_METRICS".to_string(),
            "yes".to_string(),
        )]);
        assert!(Config::from_vars(&vars).is_err());

        let vars = HashMap::from([(
            "OVN_EXPORTER_ENABLE_METRICS".to_string(),
            "false".to_string(),
        )]);
        assert!(!Config::from_vars(&vars).unwrap().enable_metrics);
    }

    #[test]
    fn test_relative_metrics_path_rejected() {
        let vars = HashMap::from([(
            "OVN_EXPORTER_METRICS_PATH".to_string(),
            "metrics".to_string(),
        )]);
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }
}
