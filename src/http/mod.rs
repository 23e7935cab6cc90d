//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → handlers.rs
//!         - /api/status, /api/status/services, /api/service_discovery
//!         - /api/execute_saga → saga plan
//!         - anything else → route table → dispatcher
//!     → error.rs (gateway errors → status codes)
//!     → Send to client
//! ```

pub mod error;
pub mod handlers;
pub mod request;
pub mod server;

pub use error::ApiError;
pub use request::{forwardable_headers, UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, GatewayServer};
