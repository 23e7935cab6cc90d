//! Saga orchestration subsystem.
//!
//! # Data Flow
//! ```text
//! SagaBuilder (plan.rs) → SagaPlan: immutable steps, built once
//!     → SagaPlan::execute(payload) creates a SagaExecution (execution.rs)
//!     → steps run in order, each a SagaStep (step.rs)
//!     → on failure: reverse compensation, SagaError (error.rs)
//! ```
//!
//! # Design Decisions
//! - Plans are shared, executions are not
//! - Steps receive a typed context instead of positional arguments
//! - The orchestrator never retries a step; retries belong to dispatch
//! - gateway_saga.rs adapts the dispatcher to the step trait

pub mod error;
pub mod execution;
pub mod gateway_saga;
pub mod plan;
pub mod step;

pub use error::{SagaError, StepError, StepTrace};
pub use execution::{SagaExecution, SagaOutcome};
pub use gateway_saga::{login_and_calendar_plan, DispatchStep, SagaPayload, LOGIN_SAGA};
pub use plan::{SagaBuilder, SagaPlan};
pub use step::{FnStep, SagaStep, StepContext, StepFuture};
