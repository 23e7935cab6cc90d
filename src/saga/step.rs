//! Saga step abstraction.

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::saga::error::StepError;

/// Boxed future returned by closure-based steps.
pub type StepFuture<T> = Pin<Box<dyn Future<Output = Result<T, StepError>> + Send>>;

/// What a step sees when it runs: its position, the saga payload and the
/// results of the steps before it in the same execution.
pub struct StepContext<P> {
    pub index: usize,
    pub payload: Arc<P>,
    pub prior: Arc<[Value]>,
}

impl<P> Clone for StepContext<P> {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            payload: self.payload.clone(),
            prior: self.prior.clone(),
        }
    }
}

impl<P> StepContext<P> {
    /// Result of an earlier step in this execution.
    pub fn result_of(&self, index: usize) -> Option<&Value> {
        self.prior.get(index)
    }
}

/// One forward action of a saga and the action that undoes it.
#[async_trait]
pub trait SagaStep<P: Send + Sync + 'static>: Send + Sync {
    fn name(&self) -> &str;

    /// Perform the step. The returned value is recorded for later steps and
    /// for this step's compensation.
    async fn run(&self, ctx: &StepContext<P>) -> Result<Value, StepError>;

    /// Undo a completed step, given the context it ran with and its result.
    async fn compensate(&self, ctx: &StepContext<P>, result: &Value) -> Result<(), StepError> {
        let _ = (ctx, result);
        Ok(())
    }
}

type Action<P> = Box<dyn Fn(StepContext<P>) -> StepFuture<Value> + Send + Sync>;
type Compensation<P> = Box<dyn Fn(StepContext<P>, Value) -> StepFuture<()> + Send + Sync>;

/// A step built from closures.
pub struct FnStep<P> {
    name: String,
    action: Action<P>,
    compensation: Option<Compensation<P>>,
}

impl<P: Send + Sync + 'static> FnStep<P> {
    pub fn new<F, Fut>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn(StepContext<P>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, StepError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            action: Box::new(move |ctx| Box::pin(action(ctx))),
            compensation: None,
        }
    }

    pub fn with_compensation<F, Fut>(mut self, compensation: F) -> Self
    where
        F: Fn(StepContext<P>, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), StepError>> + Send + 'static,
    {
        self.compensation = Some(Box::new(move |ctx, result| Box::pin(compensation(ctx, result))));
        self
    }
}

#[async_trait]
impl<P: Send + Sync + 'static> SagaStep<P> for FnStep<P> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &StepContext<P>) -> Result<Value, StepError> {
        (self.action)(ctx.clone()).await
    }

    async fn compensate(&self, ctx: &StepContext<P>, result: &Value) -> Result<(), StepError> {
        match &self.compensation {
            Some(compensation) => compensation(ctx.clone(), result.clone()).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fn_step_runs_closures() {
        let step = FnStep::new("double", |ctx: StepContext<u32>| async move {
            Ok(json!(*ctx.payload * 2))
        })
        .with_compensation(|_ctx, result| async move {
            if result == json!(42) {
                Err(StepError::Failed("cannot undo 42".into()))
            } else {
                Ok(())
            }
        });

        let ctx = StepContext {
            index: 0,
            payload: Arc::new(21),
            prior: Arc::from(Vec::new()),
        };
        let result = step.run(&ctx).await.unwrap();
        assert_eq!(result, json!(42));
        assert!(step.compensate(&ctx, &result).await.is_err());
        assert!(step.compensate(&ctx, &json!(1)).await.is_ok());
        assert_eq!(step.name(), "double");
    }

    #[test]
    fn test_result_of_prior_step() {
        let ctx = StepContext {
            index: 2,
            payload: Arc::new(()),
            prior: Arc::from(vec![json!("a"), json!("b")]),
        };
        assert_eq!(ctx.result_of(1), Some(&json!("b")));
        assert_eq!(ctx.result_of(2), None);
    }
}
