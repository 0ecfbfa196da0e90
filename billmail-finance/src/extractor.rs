//! Structured extractor: one model round-trip per email

use billmail_core::{
    AnswerProvider, BillError, BillRecord, ExtractionOutcome, NormalizedBody, TaskSpec, preview,
};
use tracing::{debug, error, info, warn};

use crate::answer::parse_answer;

/// Characters of body text carried into failure log lines
const LOG_BODY_CHARS: usize = 200;

/// Characters of raw model answer logged at debug level
const LOG_ANSWER_CHARS: usize = 2000;

/// Turns a subject and normalized body into a bill record
pub struct Extractor<P: AnswerProvider> {
    provider: P,
    task: TaskSpec,
}

impl<P: AnswerProvider> Extractor<P> {
    pub fn new(provider: P, task: TaskSpec) -> Self {
        Self { provider, task }
    }

    /// Ask the model and coerce its answer. Errors are returned, not logged.
    pub fn try_extract(&self, subject: &str, body: &NormalizedBody) -> Result<BillRecord, BillError> {
        let raw = self
            .provider
            .generate(&self.task, subject, body.as_str())
            .map_err(|e| BillError::Provider(format!("{e:#}")))?;

        debug!(
            provider = self.provider.name(),
            answer = %preview(&raw, LOG_ANSWER_CHARS),
            "model answer"
        );

        parse_answer(&raw, self.task.schema())
    }

    /// Extract one bill. Every failure is caught and logged here.
    pub fn extract(&self, subject: &str, body: &NormalizedBody) -> ExtractionOutcome {
        let outcome = ExtractionOutcome::from(self.try_extract(subject, body));

        match &outcome {
            ExtractionOutcome::Found(record) => {
                info!(subject, %record, "extracted bill");
            }
            ExtractionOutcome::NotFound => {
                info!(subject, "no bill information in email");
            }
            ExtractionOutcome::Failed(e) => {
                if let BillError::Parse { raw, .. } = e {
                    debug!(raw = %preview(raw, LOG_ANSWER_CHARS), "unparseable model answer");
                }
                let body_preview = body.preview(LOG_BODY_CHARS);
                match e {
                    BillError::Provider(_) => {
                        error!(subject, body = %body_preview, error = %e, "extraction failed")
                    }
                    _ => warn!(subject, body = %body_preview, error = %e, "extraction failed"),
                }
            }
        }
        outcome
    }
}
