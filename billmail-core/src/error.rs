//! Error taxonomy shared by the extraction pipeline

use thiserror::Error;

/// Errors raised while turning an email into a stored bill
#[derive(Error, Debug)]
pub enum BillError {
    /// Network or model call failed; the item is skipped, the run continues
    #[error("provider call failed: {0}")]
    Provider(String),

    /// Model answer could not be read as structured data
    #[error("model answer is not structured data: {reason}")]
    Parse { reason: String, raw: String },

    /// Model answer parsed but has the wrong shape
    #[error("model answer has the wrong shape: {0}")]
    Validation(String),

    /// A single field could not be coerced; that field is dropped
    #[error("field `{field}` could not be coerced from {value:?}")]
    FieldCoercion { field: &'static str, value: String },

    /// Missing credential or unusable configuration; aborts the run
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Record or run-log write failed
    #[error("sink write failed: {0}")]
    Sink(String),
}

impl BillError {
    /// Short stable name, used in run notes
    pub fn kind(&self) -> &'static str {
        match self {
            BillError::Provider(_) => "provider",
            BillError::Parse { .. } => "parse",
            BillError::Validation(_) => "validation",
            BillError::FieldCoercion { .. } => "field-coercion",
            BillError::Configuration(_) => "configuration",
            BillError::Sink(_) => "sink",
        }
    }
}
