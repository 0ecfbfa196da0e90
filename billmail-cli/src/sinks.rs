//! JSON Lines sinks: one object per line, appended.

use anyhow::{Context, Result};
use billmail_core::{BillRecord, RecordSink, RunLogSink, WorkflowRunLog};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn append<T: Serialize>(&self, value: &T) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        let mut line = serde_json::to_string(value).context("serialize line")?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("write {}", self.path.display()))?;
        Ok(())
    }
}

impl RecordSink for JsonlSink {
    fn write(&self, record: &BillRecord) -> Result<()> {
        self.append(record)
    }
}

impl RunLogSink for JsonlSink {
    fn write(&self, log: &WorkflowRunLog) -> Result<()> {
        self.append(log)
    }
}
