//! Local subprocess job runner.

use dashmap::DashMap;
use serde::Serialize;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::IngestionParams;
use crate::config::LocalJobConfig;
use crate::error::JobError;

/// Observed state of a local job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalJobState {
    Running,
    Completed,
}

/// Spawns the ingestion script as a child process and tracks it by PID
pub struct LocalJobRunner {
    config: LocalJobConfig,
    children: DashMap<u32, Child>,
}

impl LocalJobRunner {
    pub fn new(config: LocalJobConfig) -> Self {
        Self {
            config,
            children: DashMap::new(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Start `<program> <args...> --ingestion_params_dict <json>`
    pub fn spawn(&self, params: &IngestionParams) -> Result<u32, JobError> {
        if !self.config.enabled {
            return Err(JobError::RunnerNotConfigured {
                runner: "local".to_string(),
            });
        }

        let params_json = params.to_json()?;
        let child = Command::new(&self.config.program)
            .args(&self.config.args)
            .arg("--ingestion_params_dict")
            .arg(params_json)
            .spawn()
            .map_err(|source| JobError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;

        let pid = child.id().ok_or_else(|| JobError::Spawn {
            program: self.config.program.clone(),
            source: std::io::Error::other("process exited before reporting a pid"),
        })?;

        info!(pid, index = %params.request.index_name, "Local ingestion job started");
        self.children.insert(pid, child);
        Ok(pid)
    }

    /// Poll a job. Unknown PIDs count as completed.
    pub fn status(&self, pid: u32) -> LocalJobState {
        let finished = match self.children.get_mut(&pid) {
            None => return LocalJobState::Completed,
            Some(mut child) => match child.try_wait() {
                Ok(None) => false,
                Ok(Some(exit)) => {
                    debug!(pid, status = %exit, "Local ingestion job exited");
                    true
                }
                Err(e) => {
                    warn!(pid, error = %e, "Failed to poll local ingestion job");
                    true
                }
            },
        };

        if finished {
            self.children.remove(&pid);
            LocalJobState::Completed
        } else {
            LocalJobState::Running
        }
    }
}
