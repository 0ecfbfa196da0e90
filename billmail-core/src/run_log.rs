//! Workflow run log: one audit record per pipeline invocation

use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_WORKFLOW_NAME: &str = "Process Bills Workflow";

/// Overall outcome of a run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => f.write_str("Success"),
            RunStatus::Failed => f.write_str("Failed"),
        }
    }
}

/// Where a run came from (CI metadata). All optional; local runs have none.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunMetadata {
    pub name: String,
    pub commit_id: Option<String>,
    pub repository: Option<String>,
    pub run_id: Option<String>,
    pub triggered_by: Option<String>,
}

impl RunMetadata {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Link to the CI run, when both repository and run id are known
    pub fn url(&self) -> Option<String> {
        match (&self.repository, &self.run_id) {
            (Some(repo), Some(run)) => Some(format!("https://github.com/{repo}/actions/runs/{run}")),
            _ => None,
        }
    }
}

/// The persisted run record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowRunLog {
    pub name: String,
    pub status: RunStatus,
    pub commit_id: Option<String>,
    /// Wall-clock seconds
    pub duration: Option<f64>,
    pub url: Option<String>,
    pub repository: Option<String>,
    /// RFC 3339 start time
    pub date: String,
    pub notes: Option<String>,
    pub triggered_by: Option<String>,
}

impl WorkflowRunLog {
    pub fn new(meta: &RunMetadata, status: RunStatus, date: impl Into<String>) -> Self {
        Self {
            name: meta.name.clone(),
            status,
            commit_id: meta.commit_id.clone(),
            duration: None,
            url: meta.url(),
            repository: meta.repository.clone(),
            date: date.into(),
            notes: None,
            triggered_by: meta.triggered_by.clone(),
        }
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        let notes = notes.into();
        self.notes = if notes.trim().is_empty() { None } else { Some(notes) };
        self
    }
}
