//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger → broadcast → refresher stops, config updater stops, server drains
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Every background loop selects on the shutdown receiver, so sleeps and
//!   in-flight registry queries are abortable

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
