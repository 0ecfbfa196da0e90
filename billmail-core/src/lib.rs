//! billmail-core: bill record types, field coercion and collaborator seams

pub mod amount;
pub mod bill;
pub mod dates;
pub mod email;
pub mod error;
pub mod outcome;
pub mod run_log;
pub mod task_spec;
pub mod traits;

pub use amount::{amount_from_number, parse_amount};
pub use bill::{BillRecord, Category, CategorySchema};
pub use dates::normalize_date;
pub use email::{NormalizedBody, RawEmail, preview};
pub use error::BillError;
pub use outcome::ExtractionOutcome;
pub use run_log::{DEFAULT_WORKFLOW_NAME, RunMetadata, RunStatus, WorkflowRunLog};
pub use task_spec::{ANSWER_MARKER, COMPLETED_MARKER, REASONING_MARKER, TaskSpec};
pub use traits::{AnswerProvider, MailSource, RecordSink, RunLogSink};
