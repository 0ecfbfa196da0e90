//! Whole-record extraction result

use crate::bill::BillRecord;
use crate::error::BillError;

/// What one extraction produced. "Nothing found" and "failed" are kept apart:
/// both leave the email unread, but they are logged differently.
#[derive(Debug)]
pub enum ExtractionOutcome {
    /// At least one field populated
    Found(BillRecord),
    /// The model answered with a valid but empty record
    NotFound,
    /// Provider, parse or validation failure
    Failed(BillError),
}

impl ExtractionOutcome {
    /// Classify a parsed record by emptiness
    pub fn from_record(record: BillRecord) -> Self {
        if record.is_empty() {
            ExtractionOutcome::NotFound
        } else {
            ExtractionOutcome::Found(record)
        }
    }

    pub fn record(&self) -> Option<&BillRecord> {
        match self {
            ExtractionOutcome::Found(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ExtractionOutcome::Failed(_))
    }
}

impl From<Result<BillRecord, BillError>> for ExtractionOutcome {
    fn from(result: Result<BillRecord, BillError>) -> Self {
        match result {
            Ok(record) => ExtractionOutcome::from_record(record),
            Err(e) => ExtractionOutcome::Failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_record_is_not_found() {
        let outcome = ExtractionOutcome::from(Ok(BillRecord::default()));
        assert!(matches!(outcome, ExtractionOutcome::NotFound));
        assert!(outcome.record().is_none());
    }

    #[test]
    fn test_failure_is_kept_distinct() {
        let outcome = ExtractionOutcome::from(Err(BillError::Provider("timeout".to_string())));
        assert!(outcome.is_failed());
    }

    #[test]
    fn test_found() {
        let record = BillRecord {
            merchant: Some("ACME".to_string()),
            ..Default::default()
        };
        let outcome = ExtractionOutcome::from_record(record.clone());
        assert_eq!(outcome.record(), Some(&record));
    }
}
