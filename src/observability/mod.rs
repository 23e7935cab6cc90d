//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Breakers, dispatcher, refresher and sagas produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (service, endpoint, attempt, step) on every event
//! - Request ID flows from the inbound request to upstream calls
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
