//! Collaborator seams of the pipeline.
//!
//! The core owns normalization, prompting and answer parsing; everything that
//! touches a network, a mailbox or a database sits behind one of these traits.

use anyhow::Result;

use crate::bill::BillRecord;
use crate::email::RawEmail;
use crate::run_log::WorkflowRunLog;
use crate::task_spec::TaskSpec;

/// Source of unread messages
pub trait MailSource {
    /// Unread messages, optionally filtered by sender, in delivery order
    fn fetch_unread(&self, filter: Option<&str>) -> Result<Vec<RawEmail>>;

    /// Mark a message processed so later runs skip it
    fn mark_read(&self, id: &str) -> Result<()>;
}

/// A language model that answers an extraction task
pub trait AnswerProvider {
    /// Raw answer text for one email
    fn generate(&self, task: &TaskSpec, subject: &str, body: &str) -> Result<String>;

    /// Name used in log lines
    fn name(&self) -> &str {
        "llm"
    }
}

/// Storage for extracted bills
pub trait RecordSink {
    fn write(&self, record: &BillRecord) -> Result<()>;
}

/// Storage for run logs
pub trait RunLogSink {
    fn write(&self, log: &WorkflowRunLog) -> Result<()>;
}

impl<T: MailSource + ?Sized> MailSource for &T {
    fn fetch_unread(&self, filter: Option<&str>) -> Result<Vec<RawEmail>> {
        (**self).fetch_unread(filter)
    }

    fn mark_read(&self, id: &str) -> Result<()> {
        (**self).mark_read(id)
    }
}

impl<T: AnswerProvider + ?Sized> AnswerProvider for &T {
    fn generate(&self, task: &TaskSpec, subject: &str, body: &str) -> Result<String> {
        (**self).generate(task, subject, body)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: AnswerProvider + ?Sized> AnswerProvider for Box<T> {
    fn generate(&self, task: &TaskSpec, subject: &str, body: &str) -> Result<String> {
        (**self).generate(task, subject, body)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: RecordSink + ?Sized> RecordSink for &T {
    fn write(&self, record: &BillRecord) -> Result<()> {
        (**self).write(record)
    }
}

impl<T: RunLogSink + ?Sized> RunLogSink for &T {
    fn write(&self, log: &WorkflowRunLog) -> Result<()> {
        (**self).write(log)
    }
}
