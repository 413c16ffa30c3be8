//! Command runner answering from canned output.
//!
//! Rules match on a fragment of the command line (`program arg arg ...`).
//! The most recently added matching rule wins, so tests can override a
//! healthy default for a single command.

use std::sync::Mutex;

use async_trait::async_trait;
use ovn_exporter::appctl::CommandRunner;
use ovn_exporter::errors::CommandError;

use crate::fixtures;

#[derive(Debug, Clone)]
enum Reply {
    Output(String),
    Failure(String),
}

/// Mock [`CommandRunner`].
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<(String, Reply)>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    /// No rules; every command fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clustered northbound leader, southbound follower, storage ok,
    /// northd active.
    pub fn healthy_cluster() -> Self {
        let runner = Self::new();
        runner.respond(fixtures::NB_CLUSTER_STATUS_CMD, fixtures::NB_CLUSTER_STATUS);
        runner.respond(fixtures::SB_CLUSTER_STATUS_CMD, fixtures::SB_CLUSTER_STATUS);
        runner.respond(fixtures::NB_STORAGE_STATUS_CMD, fixtures::STORAGE_STATUS_OK);
        runner.respond(fixtures::SB_STORAGE_STATUS_CMD, fixtures::STORAGE_STATUS_OK);
        runner.respond(fixtures::NORTHD_STATUS_CMD, fixtures::NORTHD_STATUS_ACTIVE);
        runner.respond(fixtures::DB_IS_CLUSTERED_CMD, "");
        runner
    }

    /// Answer commands containing `fragment` with `output`.
    pub fn respond(&self, fragment: &str, output: &str) {
        self.rules
            .lock()
            .unwrap()
            .push((fragment.to_string(), Reply::Output(output.to_string())));
    }

    /// Fail commands containing `fragment` with a non-zero exit.
    pub fn fail(&self, fragment: &str, output: &str) {
        self.rules
            .lock()
            .unwrap()
            .push((fragment.to_string(), Reply::Failure(output.to_string())));
    }

    /// Command lines run so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// How many command lines contained `fragment`.
    pub fn call_count(&self, fragment: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.contains(fragment))
            .count()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<String, CommandError> {
        let line = std::iter::once(program.to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        self.calls.lock().unwrap().push(line.clone());

        let reply = self
            .rules
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(fragment, _)| line.contains(fragment.as_str()))
            .map(|(_, reply)| reply.clone());

        match reply {
            Some(Reply::Output(output)) => Ok(output),
            Some(Reply::Failure(output)) => Err(CommandError::Failed {
                program: program.to_string(),
                status: "exit status: 1".to_string(),
                output,
            }),
            None => Err(CommandError::Failed {
                program: program.to_string(),
                status: "exit status: 127".to_string(),
                output: format!("no scripted response for `{line}`"),
            }),
        }
    }
}
