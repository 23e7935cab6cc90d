//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! route handler / saga step
//!     → dispatcher.rs (retry loop, endpoint selection, breaker gate)
//!     → upstream.rs (one HTTP exchange with a deadline)
//!     → UpstreamResponse or DispatchError (error.rs)
//! ```

pub mod dispatcher;
pub mod error;
pub mod upstream;

pub use dispatcher::RequestDispatcher;
pub use error::{AttemptError, DispatchError};
pub use upstream::{HyperUpstream, Upstream, UpstreamError, UpstreamRequest, UpstreamResponse};
