//! Saga plans and their builder.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::saga::error::SagaError;
use crate::saga::execution::{SagaExecution, SagaOutcome};
use crate::saga::step::{FnStep, SagaStep, StepContext, StepFuture};
use serde_json::Value;

/// Immutable, ordered list of steps. Cheap to clone and safe to execute
/// concurrently; each execution keeps its own results.
pub struct SagaPlan<P: Send + Sync + 'static> {
    name: Arc<str>,
    steps: Arc<[Arc<dyn SagaStep<P>>]>,
    deadline: Option<Duration>,
}

impl<P: Send + Sync + 'static> Clone for SagaPlan<P> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            steps: self.steps.clone(),
            deadline: self.deadline,
        }
    }
}

impl<P: Send + Sync + 'static> SagaPlan<P> {
    pub fn builder(name: impl Into<String>) -> SagaBuilder<P> {
        SagaBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Arc<dyn SagaStep<P>>] {
        &self.steps
    }

    /// Bound on the total time spent in forward actions.
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run the plan against `payload` in a fresh execution.
    pub async fn execute(&self, payload: P) -> Result<SagaOutcome, SagaError> {
        SagaExecution::new(self, payload).run().await
    }

    /// Run the plan on its own task.
    ///
    /// The execution and any compensation run to completion even when the
    /// returned handle is dropped.
    pub fn spawn(&self, payload: P) -> JoinHandle<Result<SagaOutcome, SagaError>> {
        let plan = self.clone();
        tokio::spawn(async move { plan.execute(payload).await })
    }
}

/// Collects steps in execution order.
pub struct SagaBuilder<P: Send + Sync + 'static> {
    name: String,
    steps: Vec<Arc<dyn SagaStep<P>>>,
    deadline: Option<Duration>,
}

impl<P: Send + Sync + 'static> SagaBuilder<P> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            deadline: None,
        }
    }

    /// Append a step.
    pub fn step(mut self, step: impl SagaStep<P> + 'static) -> Self {
        self.steps.push(Arc::new(step));
        self
    }

    /// Append a step built from an action and its compensation.
    pub fn add_step<A, C>(self, name: impl Into<String>, action: A, compensation: C) -> Self
    where
        A: Fn(StepContext<P>) -> StepFuture<Value> + Send + Sync + 'static,
        C: Fn(StepContext<P>, Value) -> StepFuture<()> + Send + Sync + 'static,
    {
        self.step(FnStep::new(name, action).with_compensation(compensation))
    }

    /// Fail the current forward action once `deadline` has passed since the
    /// execution started.
    pub fn deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn build(self) -> SagaPlan<P> {
        SagaPlan {
            name: self.name.into(),
            steps: self.steps.into(),
            deadline: self.deadline,
        }
    }
}
