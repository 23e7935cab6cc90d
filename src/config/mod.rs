//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via LiveConfig (ArcSwap) to all subsystems
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of the LiveConfig pointer
//!     → dispatcher and refresher observe new config on next use
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BreakerConfig, GatewayConfig, ListenerConfig, ObservabilityConfig, RegistryConfig,
    RegistryKind, RetryConfig, RouteConfig, SagaConfig, ServiceConfig, StaticInstanceConfig,
    TimeoutConfig, CALENDAR_SERVICE, USER_SERVICE,
};
pub use watcher::{live, LiveConfig};
