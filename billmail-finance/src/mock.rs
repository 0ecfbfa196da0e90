//! In-memory collaborators for tests and dry runs.
//!
//! Each double is `Clone` and shares its state between clones, so a test can
//! hand one copy to the pipeline and inspect the other afterwards.

use anyhow::{Result, anyhow, bail};
use billmail_core::{
    AnswerProvider, BillRecord, MailSource, RawEmail, RecordSink, RunLogSink, TaskSpec,
    WorkflowRunLog,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Scripted model answers
#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Vec<std::result::Result<String, String>>>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockProvider {
    /// Same answer for every request
    pub fn new(response: impl Into<String>) -> Self {
        Self::scripted(vec![Ok(response.into())])
    }

    /// Every request fails with `message`
    pub fn failing(message: impl Into<String>) -> Self {
        Self::scripted(vec![Err(message.into())])
    }

    /// Answers in order; the last one repeats once the script runs out
    pub fn scripted(responses: Vec<std::result::Result<String, String>>) -> Self {
        Self {
            responses: Arc::new(responses),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Subject and body of the most recent request
    pub fn last_request(&self) -> Option<(String, String)> {
        lock(&self.calls).last().cloned()
    }
}

impl AnswerProvider for MockProvider {
    fn generate(&self, _task: &TaskSpec, subject: &str, body: &str) -> Result<String> {
        let mut calls = lock(&self.calls);
        let idx = calls.len().min(self.responses.len().saturating_sub(1));
        calls.push((subject.to_string(), body.to_string()));

        match self.responses.get(idx) {
            Some(Ok(text)) => Ok(text.clone()),
            Some(Err(message)) => Err(anyhow!("{message}")),
            None => bail!("mock provider has no scripted answer"),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Mailbox holding a fixed set of messages
#[derive(Debug, Clone, Default)]
pub struct MemoryMailbox {
    emails: Arc<Vec<RawEmail>>,
    read: Arc<Mutex<HashSet<String>>>,
    fetch_error: Option<String>,
    fail_mark_read: bool,
}

impl MemoryMailbox {
    pub fn new(emails: Vec<RawEmail>) -> Self {
        Self {
            emails: Arc::new(emails),
            ..Default::default()
        }
    }

    /// `fetch_unread` fails with `message`
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self {
            fetch_error: Some(message.into()),
            ..Default::default()
        }
    }

    /// `mark_read` always fails
    pub fn with_failing_mark_read(mut self) -> Self {
        self.fail_mark_read = true;
        self
    }

    pub fn is_read(&self, id: &str) -> bool {
        lock(&self.read).contains(id)
    }

    pub fn read_count(&self) -> usize {
        lock(&self.read).len()
    }
}

impl MailSource for MemoryMailbox {
    fn fetch_unread(&self, filter: Option<&str>) -> Result<Vec<RawEmail>> {
        if let Some(message) = &self.fetch_error {
            bail!("{message}");
        }
        let read = lock(&self.read);
        let filter = filter.map(str::to_lowercase);
        Ok(self
            .emails
            .iter()
            .filter(|e| !read.contains(&e.id))
            .filter(|e| match &filter {
                Some(f) => e.sender.to_lowercase().contains(f),
                None => true,
            })
            .cloned()
            .collect())
    }

    fn mark_read(&self, id: &str) -> Result<()> {
        if self.fail_mark_read {
            bail!("mailbox refused to mark {id} read");
        }
        lock(&self.read).insert(id.to_string());
        Ok(())
    }
}

/// Record sink that keeps everything in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordSink {
    records: Arc<Mutex<Vec<BillRecord>>>,
    fail: bool,
}

impl MemoryRecordSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn records(&self) -> Vec<BillRecord> {
        lock(&self.records).clone()
    }
}

impl RecordSink for MemoryRecordSink {
    fn write(&self, record: &BillRecord) -> Result<()> {
        if self.fail {
            bail!("record store unavailable");
        }
        lock(&self.records).push(record.clone());
        Ok(())
    }
}

/// Run-log sink that keeps everything in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryRunLogSink {
    logs: Arc<Mutex<Vec<WorkflowRunLog>>>,
    fail: bool,
}

impl MemoryRunLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn logs(&self) -> Vec<WorkflowRunLog> {
        lock(&self.logs).clone()
    }
}

impl RunLogSink for MemoryRunLogSink {
    fn write(&self, log: &WorkflowRunLog) -> Result<()> {
        if self.fail {
            bail!("run log store unavailable");
        }
        lock(&self.logs).push(log.clone());
        Ok(())
    }
}
