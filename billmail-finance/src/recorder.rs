//! Run recorder: guarantees exactly one run-log write per invocation.
//!
//! The recorder is started before anything that can fail. Consuming it with
//! `complete` or `abort` writes the log; dropping it unfinished (early return,
//! panic unwinding) writes a Failed log instead. A failed write is logged and
//! never turns into a run error.

use billmail_core::{RunLogSink, RunMetadata, RunStatus, WorkflowRunLog};
use chrono::Utc;
use std::time::Instant;
use tracing::{error, info};

use crate::pipeline::RunSummary;

pub struct RunRecorder<L: RunLogSink> {
    sink: L,
    meta: RunMetadata,
    started_at: String,
    clock: Instant,
    written: bool,
}

impl<L: RunLogSink> RunRecorder<L> {
    pub fn start(sink: L, meta: RunMetadata) -> Self {
        info!(workflow = %meta.name, "run started");
        Self {
            sink,
            meta,
            started_at: Utc::now().to_rfc3339(),
            clock: Instant::now(),
            written: false,
        }
    }

    /// Record a finished pass; status follows the summary.
    pub fn complete(mut self, summary: &RunSummary) -> WorkflowRunLog {
        self.finish(summary.status(), summary.notes())
    }

    /// Record a run-level failure.
    pub fn abort(mut self, reason: impl std::fmt::Display) -> WorkflowRunLog {
        self.finish(RunStatus::Failed, format!("workflow failed: {reason}"))
    }

    fn finish(&mut self, status: RunStatus, notes: String) -> WorkflowRunLog {
        self.written = true;
        let log = WorkflowRunLog::new(&self.meta, status, self.started_at.clone())
            .with_duration(self.clock.elapsed().as_secs_f64())
            .with_notes(notes);

        match self.sink.write(&log) {
            Ok(()) => info!(workflow = %log.name, status = %log.status, "run logged"),
            Err(e) => {
                error!(workflow = %log.name, status = %log.status, "failed to write run log: {e:#}")
            }
        }
        log
    }
}

impl<L: RunLogSink> Drop for RunRecorder<L> {
    fn drop(&mut self) {
        if self.written {
            return;
        }
        let reason = if std::thread::panicking() {
            "workflow failed: run panicked"
        } else {
            "workflow failed: run ended without completing"
        };
        self.finish(RunStatus::Failed, reason.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MemoryRunLogSink;
    use billmail_core::DEFAULT_WORKFLOW_NAME;

    fn meta() -> RunMetadata {
        RunMetadata {
            name: DEFAULT_WORKFLOW_NAME.to_string(),
            commit_id: Some("abc123".to_string()),
            repository: Some("octo/bills".to_string()),
            run_id: Some("42".to_string()),
            triggered_by: Some("octocat".to_string()),
        }
    }

    #[test]
    fn test_complete_writes_once() {
        let sink = MemoryRunLogSink::new();
        let recorder = RunRecorder::start(sink.clone(), meta());
        let log = recorder.complete(&RunSummary::default());

        assert_eq!(log.status, RunStatus::Success);
        assert_eq!(log.url.as_deref(), Some("https://github.com/octo/bills/actions/runs/42"));
        assert!(log.duration.unwrap() >= 0.0);
        assert_eq!(sink.logs(), vec![log]);
    }

    #[test]
    fn test_abort_is_failed_with_note() {
        let sink = MemoryRunLogSink::new();
        let log = RunRecorder::start(sink.clone(), meta())
            .abort("GEMINI_API_KEY is not set");
        assert_eq!(log.status, RunStatus::Failed);
        assert_eq!(log.notes.as_deref(), Some("workflow failed: GEMINI_API_KEY is not set"));
        assert_eq!(sink.logs().len(), 1);
    }

    #[test]
    fn test_unwritable_run_log_is_not_an_error() {
        let sink = MemoryRunLogSink::failing();
        let log = RunRecorder::start(sink.clone(), meta()).complete(&RunSummary::default());
        assert_eq!(log.status, RunStatus::Success);
        assert!(sink.logs().is_empty());
    }

    #[test]
    fn test_drop_without_finish_writes_failed() {
        let sink = MemoryRunLogSink::new();
        {
            let _recorder = RunRecorder::start(sink.clone(), meta());
        }
        let logs = sink.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, RunStatus::Failed);
    }

    #[test]
    fn test_panic_still_writes_log() {
        let sink = MemoryRunLogSink::new();
        let inner = sink.clone();
        let result = std::panic::catch_unwind(move || {
            let _recorder = RunRecorder::start(inner, meta());
            panic!("boom");
        });
        assert!(result.is_err());
        let logs = sink.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].notes.as_deref(), Some("workflow failed: run panicked"));
    }
}
