//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch attempt for a service
//!     → ServiceCache::with_pool (lock that service's list + cursor only)
//!     → SelectionPolicy::pick (round_robin.rs rotates through the list)
//!     → Endpoint returned, or NotFound when the healthy list is empty
//! ```
//!
//! # Design Decisions
//! - Selection reads the cache; refresh is owned by the discovery subsystem
//! - Cursor and list are read under one per-service lock, never a global one
//! - Unhealthy instances never reach the list, so selection does no health filtering

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::discovery::cache::ServiceCache;

pub mod endpoint;
pub mod round_robin;

pub use endpoint::Endpoint;
pub use round_robin::RoundRobin;

/// Strategy choosing one endpoint from a service's healthy list.
pub trait SelectionPolicy: Send + Sync + fmt::Debug {
    /// Pick an endpoint and advance `cursor`. Must leave `cursor` alone when
    /// `endpoints` is empty.
    fn pick(&self, endpoints: &[Endpoint], cursor: &mut usize) -> Option<Endpoint>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectError {
    #[error("no healthy endpoint cached for service '{0}'")]
    NotFound(String),
}

/// Picks endpoints for services from the shared cache.
pub struct LoadBalancer {
    cache: Arc<ServiceCache>,
    policy: Box<dyn SelectionPolicy>,
}

impl LoadBalancer {
    /// Round-robin balancer over `cache`.
    pub fn new(cache: Arc<ServiceCache>) -> Self {
        Self::with_policy(cache, Box::new(RoundRobin::new()))
    }

    pub fn with_policy(cache: Arc<ServiceCache>, policy: Box<dyn SelectionPolicy>) -> Self {
        Self { cache, policy }
    }

    pub fn cache(&self) -> &Arc<ServiceCache> {
        &self.cache
    }

    /// Select the next endpoint for `service`.
    pub fn select(&self, service: &str) -> Result<Endpoint, SelectError> {
        self.cache
            .with_pool(service, |pool| self.policy.pick(&pool.endpoints, &mut pool.cursor))
            .flatten()
            .ok_or_else(|| SelectError::NotFound(service.to_string()))
    }
}
