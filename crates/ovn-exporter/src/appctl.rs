//! External status queries (`ovn-appctl`, `ovsdb-tool`).
//!
//! Commands run without a shell through the [`CommandRunner`] seam so
//! tests can script their output. Output is stdout followed by stderr,
//! matching what an operator sees on a terminal.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::database::Database;
use crate::errors::CommandError;

/// Runs an external program and returns its combined output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`.
    ///
    /// # Errors
    ///
    /// `CommandError::Spawn` if the process cannot start,
    /// `CommandError::Failed` on non-zero exit (output attached),
    /// `CommandError::Timeout` if it does not finish in time.
    async fn run(&self, program: &str, args: &[String]) -> Result<String, CommandError>;
}

/// [`CommandRunner`] backed by real child processes.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<String, CommandError> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| CommandError::Timeout {
                program: program.to_string(),
                timeout: self.timeout,
            })?
            .map_err(|source| CommandError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(CommandError::Failed {
                program: program.to_string(),
                status: output.status.to_string(),
                output: combined,
            });
        }

        Ok(combined)
    }
}

/// Typed status queries built on a [`CommandRunner`].
#[derive(Debug, Clone)]
pub struct StatusQueries {
    appctl: String,
    ovsdb_tool: String,
}

impl StatusQueries {
    #[must_use]
    pub fn new(appctl: impl Into<String>, ovsdb_tool: impl Into<String>) -> Self {
        Self {
            appctl: appctl.into(),
            ovsdb_tool: ovsdb_tool.into(),
        }
    }

    /// `ovn-appctl -t <ctl> cluster/status <DB>`.
    pub async fn cluster_status(
        &self,
        runner: &dyn CommandRunner,
        control_socket: &str,
        database: Database,
    ) -> Result<String, CommandError> {
        runner
            .run(
                &self.appctl,
                &appctl_args(control_socket, &["cluster/status", database.name()]),
            )
            .await
    }

    /// `ovn-appctl -t <ctl> ovsdb-server/get-db-storage-status <DB>`.
    pub async fn storage_status(
        &self,
        runner: &dyn CommandRunner,
        control_socket: &str,
        database: Database,
    ) -> Result<String, CommandError> {
        runner
            .run(
                &self.appctl,
                &appctl_args(
                    control_socket,
                    &["ovsdb-server/get-db-storage-status", database.name()],
                ),
            )
            .await
    }

    /// `ovn-appctl -t <ctl> status` against ovn-northd.
    pub async fn northd_status(
        &self,
        runner: &dyn CommandRunner,
        control_socket: &str,
    ) -> Result<String, CommandError> {
        runner
            .run(&self.appctl, &appctl_args(control_socket, &["status"]))
            .await
    }

    /// `ovsdb-tool db-is-clustered <file>`.
    ///
    /// Exit status is the answer: success means clustered. A failing
    /// command is returned as an error, never as `Ok(false)`; callers decide
    /// how to report it.
    pub async fn is_clustered(
        &self,
        runner: &dyn CommandRunner,
        db_file: &str,
    ) -> Result<bool, CommandError> {
        runner
            .run(
                &self.ovsdb_tool,
                &["db-is-clustered".to_string(), db_file.to_string()],
            )
            .await?;
        Ok(true)
    }
}

fn appctl_args(control_socket: &str, rest: &[&str]) -> Vec<String> {
    let mut args = vec!["-t".to_string(), control_socket.to_string()];
    args.extend(rest.iter().map(|s| (*s).to_string()));
    args
}
