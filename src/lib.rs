//! API gateway with health-aware load balancing, per-service circuit
//! breakers and saga orchestration.

// Core subsystems
pub mod config;
pub mod dispatch;
pub mod http;
pub mod routing;
pub mod saga;

// Traffic management
pub mod discovery;
pub mod load_balancer;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
