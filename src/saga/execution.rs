//! Single run of a saga plan.
//!
//! # Data Flow
//! ```text
//! for each step, in order:
//!     → run(context{index, payload, prior results}) under the remaining deadline
//!     → Ok: record (context, result) in this execution
//!     → Err: capture trace, compensate recorded steps newest-first, return SagaError
//! ```
//!
//! # Design Decisions
//! - Results live in the execution, never in the plan or the steps
//! - A failing step is never compensated; it did not complete
//! - Compensation is best-effort: every completed step gets one attempt,
//!   failures are collected, and the sweep always finishes
//! - The deadline applies to forward actions only

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::observability::metrics;
use crate::resilience::with_deadline;
use crate::saga::error::{SagaError, StepError, StepTrace};
use crate::saga::plan::SagaPlan;
use crate::saga::step::StepContext;

/// Results of a fully successful execution, one per step.
#[derive(Debug, Clone)]
pub struct SagaOutcome {
    pub plan: String,
    pub results: Vec<Value>,
    pub elapsed: Duration,
}

struct CompletedStep<P> {
    context: StepContext<P>,
    result: Value,
}

pub struct SagaExecution<'p, P: Send + Sync + 'static> {
    plan: &'p SagaPlan<P>,
    payload: Arc<P>,
    completed: Vec<CompletedStep<P>>,
}

impl<'p, P: Send + Sync + 'static> SagaExecution<'p, P> {
    pub fn new(plan: &'p SagaPlan<P>, payload: P) -> Self {
        Self {
            plan,
            payload: Arc::new(payload),
            completed: Vec::with_capacity(plan.steps().len()),
        }
    }

    pub async fn run(mut self) -> Result<SagaOutcome, SagaError> {
        let plan = self.plan;
        let started = Instant::now();
        tracing::debug!(plan = plan.name(), steps = plan.steps().len(), "Saga started");

        for (index, step) in plan.steps().iter().enumerate() {
            let context = StepContext {
                index,
                payload: self.payload.clone(),
                prior: self.completed.iter().map(|c| c.result.clone()).collect(),
            };

            let step_started = Instant::now();
            let result = match plan.deadline() {
                Some(limit) => {
                    let remaining = limit.saturating_sub(started.elapsed());
                    with_deadline(remaining, step.run(&context))
                        .await
                        .unwrap_or(Err(StepError::DeadlineExceeded(limit)))
                }
                None => step.run(&context).await,
            };

            match result {
                Ok(value) => {
                    tracing::debug!(
                        plan = plan.name(),
                        step = step.name(),
                        index,
                        elapsed = ?step_started.elapsed(),
                        "Saga step completed"
                    );
                    self.completed.push(CompletedStep { context, result: value });
                }
                Err(action_error) => {
                    let action_trace = StepTrace::capture(step.name(), step_started.elapsed(), &action_error);
                    tracing::warn!(
                        plan = plan.name(),
                        step = step.name(),
                        index,
                        error = %action_error,
                        "Saga step failed, compensating completed steps"
                    );

                    let (compensation_errors, compensation_traces) = self.compensate().await;
                    metrics::record_saga(plan.name(), "failed");

                    return Err(SagaError {
                        plan: plan.name().to_string(),
                        failed_step_index: index,
                        failed_step: step.name().to_string(),
                        action_error,
                        action_trace,
                        compensation_errors,
                        compensation_traces,
                    });
                }
            }
        }

        metrics::record_saga(plan.name(), "succeeded");
        tracing::info!(plan = plan.name(), elapsed = ?started.elapsed(), "Saga completed");

        Ok(SagaOutcome {
            plan: plan.name().to_string(),
            results: self.completed.into_iter().map(|c| c.result).collect(),
            elapsed: started.elapsed(),
        })
    }

    async fn compensate(&self) -> (BTreeMap<usize, StepError>, BTreeMap<usize, StepTrace>) {
        let mut errors = BTreeMap::new();
        let mut traces = BTreeMap::new();

        for completed in self.completed.iter().rev() {
            let index = completed.context.index;
            let step = &self.plan.steps()[index];
            let started = Instant::now();

            match step.compensate(&completed.context, &completed.result).await {
                Ok(()) => {
                    tracing::info!(plan = self.plan.name(), step = step.name(), index, "Compensation succeeded");
                    metrics::record_compensation(self.plan.name(), "succeeded");
                }
                Err(e) => {
                    tracing::error!(
                        plan = self.plan.name(),
                        step = step.name(),
                        index,
                        error = %e,
                        "Compensation failed, continuing rollback"
                    );
                    metrics::record_compensation(self.plan.name(), "failed");
                    traces.insert(index, StepTrace::capture(step.name(), started.elapsed(), &e));
                    errors.insert(index, e);
                }
            }
        }

        (errors, traces)
    }
}
