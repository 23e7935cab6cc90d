//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → router.rs (longest matching prefix)
//!     → Return: Route{service} or no match (404)
//!
//! Route compilation (at startup):
//!     RouteConfig[]
//!     → sort by prefix length
//!     → freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route

pub mod router;

pub use router::{Route, RouteTable};
