//! Service discovery subsystem.
//!
//! # Data Flow
//! ```text
//! refresh.rs (periodic timer, one cycle per refresh interval)
//!     → registry.rs trait: consul.rs or static_registry.rs
//!     → cache.rs partitions healthy/unhealthy, swaps in the healthy list
//!     → load_balancer reads the list per request
//! ```
//!
//! # Design Decisions
//! - A failed refresh never empties the cache; stale beats empty
//! - Registry calls carry their own timeout
//! - The refresher is the only writer; request handling only reads

use std::sync::Arc;
use std::time::Duration;

use crate::config::{RegistryConfig, RegistryKind};

pub mod cache;
pub mod consul;
pub mod refresh;
pub mod registry;
pub mod static_registry;

pub use cache::{RefreshSummary, ServiceCache};
pub use consul::ConsulRegistry;
pub use refresh::CacheRefresher;
pub use registry::{HealthCheck, RegistryError, ServiceInstance, ServiceRegistry};
pub use static_registry::StaticRegistry;

/// Build the registry client selected by configuration.
pub fn build_registry(config: &RegistryConfig) -> Result<Arc<dyn ServiceRegistry>, RegistryError> {
    match config.kind {
        RegistryKind::Consul => {
            tracing::info!(address = %config.address, "Using Consul service registry");
            let registry = ConsulRegistry::new(&config.address, Duration::from_secs(config.timeout_secs))?;
            Ok(Arc::new(registry))
        }
        RegistryKind::Static => {
            tracing::info!(
                instances = config.static_instances.len(),
                "Using static service registry"
            );
            Ok(Arc::new(StaticRegistry::from_config(&config.static_instances)))
        }
    }
}
