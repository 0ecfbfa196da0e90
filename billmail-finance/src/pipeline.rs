//! Pipeline controller: fetch → (normalize → extract → resolve → store → mark read)*.
//!
//! Items are processed one at a time in mail-source order. A per-item
//! failure is recorded in the summary and the batch moves on; only a failed
//! fetch ends a pass early.

use anyhow::{Context, Result};
use billmail_core::{
    AnswerProvider, BillRecord, ExtractionOutcome, MailSource, RawEmail, RecordSink, RunLogSink,
    RunStatus, WorkflowRunLog,
};
use billmail_ingest::normalize;
use tracing::{debug, error, info, warn};

use crate::category_rules::{CategoryMapping, resolve};
use crate::extractor::Extractor;
use crate::recorder::RunRecorder;

/// What happened to one email
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    /// Written to the record sink
    Stored {
        record: BillRecord,
        /// Set when the email could not be marked read afterwards
        mark_read_error: Option<String>,
    },
    /// Valid answer without bill data; email left unread
    NoBill,
    /// Extraction or storage failed; email left unread
    Failed(String),
}

/// Counters and notes for one pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub processed: usize,
    pub stored: usize,
    pub without_bill: usize,
    pub failed: usize,
    /// `(email id, reason)` per failed item
    pub failures: Vec<(String, String)>,
    pub warnings: Vec<String>,
}

impl RunSummary {
    pub fn record(&mut self, email_id: &str, outcome: &ItemOutcome) {
        self.processed += 1;
        match outcome {
            ItemOutcome::Stored { mark_read_error, .. } => {
                self.stored += 1;
                if let Some(e) = mark_read_error {
                    self.warnings
                        .push(format!("{email_id}: stored but not marked read: {e}"));
                }
            }
            ItemOutcome::NoBill => self.without_bill += 1,
            ItemOutcome::Failed(reason) => {
                self.failed += 1;
                self.failures.push((email_id.to_string(), reason.clone()));
            }
        }
    }

    /// Failed only when something was attempted and nothing succeeded.
    pub fn status(&self) -> RunStatus {
        if self.processed > 0 && self.failed == self.processed {
            RunStatus::Failed
        } else {
            RunStatus::Success
        }
    }

    pub fn notes(&self) -> String {
        let mut lines = vec![format!(
            "processed {} email(s): {} stored, {} without bill data, {} failed",
            self.processed, self.stored, self.without_bill, self.failed
        )];
        lines.extend(self.failures.iter().map(|(id, reason)| format!("{id}: {reason}")));
        lines.extend(self.warnings.iter().cloned());
        lines.join("\n")
    }
}

pub struct Pipeline<M, P, S>
where
    M: MailSource,
    P: AnswerProvider,
    S: RecordSink,
{
    mail: M,
    extractor: Extractor<P>,
    sink: S,
    mapping: CategoryMapping,
    sender_filter: Option<String>,
}

impl<M, P, S> Pipeline<M, P, S>
where
    M: MailSource,
    P: AnswerProvider,
    S: RecordSink,
{
    pub fn new(mail: M, extractor: Extractor<P>, sink: S, mapping: CategoryMapping) -> Self {
        Self {
            mail,
            extractor,
            sink,
            mapping,
            sender_filter: None,
        }
    }

    /// Only process messages whose sender contains `filter` (case-insensitive)
    pub fn with_sender_filter(mut self, filter: impl Into<String>) -> Self {
        let filter = filter.into();
        self.sender_filter = if filter.trim().is_empty() { None } else { Some(filter) };
        self
    }

    /// One pass over the unread messages. Errors only when fetching fails.
    pub fn run(&self) -> Result<RunSummary> {
        let emails = self
            .mail
            .fetch_unread(self.sender_filter.as_deref())
            .context("fetching unread emails")?;
        info!(count = emails.len(), "found unread emails");

        let mut summary = RunSummary::default();
        for email in &emails {
            let outcome = self.process_email(email);
            summary.record(&email.id, &outcome);
        }

        info!(
            processed = summary.processed,
            stored = summary.stored,
            without_bill = summary.without_bill,
            failed = summary.failed,
            "pass finished"
        );
        Ok(summary)
    }

    /// Run a pass and log it through `recorder`, whatever the result.
    pub fn run_recorded<L: RunLogSink>(&self, recorder: RunRecorder<L>) -> WorkflowRunLog {
        match self.run() {
            Ok(summary) => recorder.complete(&summary),
            Err(e) => {
                error!("workflow failed: {e:#}");
                recorder.abort(format!("{e:#}"))
            }
        }
    }

    pub fn process_email(&self, email: &RawEmail) -> ItemOutcome {
        debug!(id = %email.id, subject = %email.subject, "processing email");
        let body = normalize(&email.body);

        let mut record = match self.extractor.extract(&email.subject, &body) {
            ExtractionOutcome::Found(record) => record,
            ExtractionOutcome::NotFound => {
                info!(id = %email.id, "no bill information found, leaving unread");
                return ItemOutcome::NoBill;
            }
            ExtractionOutcome::Failed(e) => {
                return ItemOutcome::Failed(format!("{} error: {e}", e.kind()));
            }
        };

        if let Some(category) = resolve(record.merchant.as_deref(), &self.mapping) {
            if record.category != Some(category) {
                debug!(
                    id = %email.id,
                    model = ?record.category,
                    resolved = %category,
                    "category set by merchant rule"
                );
            }
            record.category = Some(category);
        }

        if let Err(e) = self.sink.write(&record) {
            error!(id = %email.id, %record, "record write failed: {e:#}");
            return ItemOutcome::Failed(format!("sink error: {e:#}"));
        }

        let mark_read_error = match self.mail.mark_read(&email.id) {
            Ok(()) => {
                info!(id = %email.id, %record, "stored bill and marked email read");
                None
            }
            Err(e) => {
                warn!(id = %email.id, "stored bill but could not mark email read: {e:#}");
                Some(format!("{e:#}"))
            }
        };

        ItemOutcome::Stored {
            record,
            mark_read_error,
        }
    }
}
