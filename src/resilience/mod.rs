//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch attempt:
//!     → retries.rs (attempt budget, backoff before the next attempt)
//!     → breakers.rs (look up the service's breaker)
//!     → circuit_breaker.rs (admit or reject, record the outcome)
//!     → timeouts.rs (deadline around the outbound call)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every outbound call has a deadline
//! - A breaker guards exactly one attempt; retry decisions live in dispatch
//! - Breaker state is shared by all requests targeting the same service

pub mod backoff;
pub mod breakers;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use breakers::BreakerRegistry;
pub use circuit_breaker::{BreakerError, BreakerSettings, BreakerSnapshot, BreakerState, CircuitBreaker};
pub use retries::RetryPolicy;
pub use timeouts::{with_deadline, DeadlineExceeded};
