//! Saga error types and failure traces.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::collections::BTreeMap;
use std::error::Error as _;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::dispatch::DispatchError;

/// Failure of a single saga action or compensation.
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("unexpected status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("saga deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    #[error("invalid step payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("{0}")]
    Failed(String),
}

/// Diagnostics captured when a step or compensation fails.
#[derive(Debug, Clone)]
pub struct StepTrace {
    pub step: String,
    pub elapsed: Duration,
    /// The error's source chain, outermost first.
    pub causes: Vec<String>,
    /// Present only when backtraces are enabled (`RUST_BACKTRACE`).
    pub backtrace: Option<String>,
}

impl StepTrace {
    pub fn capture(step: &str, elapsed: Duration, error: &StepError) -> Self {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }

        let backtrace = Backtrace::capture();
        let backtrace = (backtrace.status() == BacktraceStatus::Captured).then(|| backtrace.to_string());

        Self {
            step: step.to_string(),
            elapsed,
            causes,
            backtrace,
        }
    }
}

impl fmt::Display for StepTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  step '{}' failed after {:?}", self.step, self.elapsed)?;
        for cause in &self.causes {
            write!(f, "\n  caused by: {cause}")?;
        }
        if let Some(backtrace) = &self.backtrace {
            write!(f, "\n  backtrace:\n{backtrace}")?;
        }
        Ok(())
    }
}

/// A failed saga execution: the action that failed and every compensation
/// that failed while rolling back.
#[derive(Debug)]
pub struct SagaError {
    pub plan: String,
    pub failed_step_index: usize,
    pub failed_step: String,
    pub action_error: StepError,
    pub action_trace: StepTrace,
    pub compensation_errors: BTreeMap<usize, StepError>,
    pub compensation_traces: BTreeMap<usize, StepTrace>,
}

impl SagaError {
    /// True when every completed step was rolled back cleanly.
    pub fn fully_compensated(&self) -> bool {
        self.compensation_errors.is_empty()
    }
}

impl fmt::Display for SagaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Transaction failed at step {} ({}): {}\n{}",
            self.failed_step_index, self.failed_step, self.action_error, self.action_trace
        )?;

        if !self.compensation_errors.is_empty() {
            f.write_str("\nCompensation errors:")?;
            for (index, error) in &self.compensation_errors {
                match self.compensation_traces.get(index) {
                    Some(trace) => write!(f, "\n  step {index} ({}): {error}", trace.step)?,
                    None => write!(f, "\n  step {index}: {error}")?,
                }
            }
        }
        Ok(())
    }
}

impl std::error::Error for SagaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.action_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{AttemptError, UpstreamError};

    #[test]
    fn test_trace_records_source_chain() {
        let error = StepError::Dispatch(DispatchError::ServiceUnavailable {
            service: "calendar-service".into(),
            attempts: 3,
            source: AttemptError::Upstream(UpstreamError::Status { status: 503 }),
        });
        let trace = StepTrace::capture("calendar-status", Duration::from_millis(12), &error);

        assert_eq!(trace.step, "calendar-status");
        assert_eq!(trace.causes, vec!["upstream responded with status 503"]);
        assert!(trace.to_string().contains("caused by: upstream responded with status 503"));
    }

    #[test]
    fn test_saga_error_rendering() {
        let action_error = StepError::Failed("calendar down".into());
        let comp_error = StepError::Rejected {
            status: 409,
            body: "already cancelled".into(),
        };

        let err = SagaError {
            plan: "booking".into(),
            failed_step_index: 2,
            failed_step: "notify".into(),
            action_trace: StepTrace::capture("notify", Duration::ZERO, &action_error),
            action_error,
            compensation_traces: BTreeMap::from([(
                1,
                StepTrace::capture("reserve", Duration::ZERO, &comp_error),
            )]),
            compensation_errors: BTreeMap::from([(1, comp_error)]),
        };

        let rendered = err.to_string();
        assert!(rendered.starts_with("Transaction failed at step 2 (notify): calendar down"));
        assert!(rendered.contains("Compensation errors:\n  step 1 (reserve): unexpected status 409: already cancelled"));
        assert!(!err.fully_compensated());
    }
}
