//! Health-aware service cache.
//!
//! # Responsibilities
//! - Hold each service's healthy endpoint list and rotation cursor
//! - Replace a service's list wholesale on refresh
//! - Keep the previous list when a refresh fails
//!
//! # Design Decisions
//! - Each service has its own `Mutex<ServicePool>`; services never contend
//! - Lists are `Arc<[Endpoint]>`, built off to the side and swapped in
//! - The registry call happens before any lock is taken

use dashmap::DashMap;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::discovery::registry::{RegistryError, ServiceRegistry};
use crate::load_balancer::Endpoint;
use crate::observability::metrics;
use crate::resilience::with_deadline;

/// A service's healthy endpoints and its rotation cursor.
#[derive(Debug)]
pub struct ServicePool {
    pub endpoints: Arc<[Endpoint]>,
    pub cursor: usize,
}

/// Result of one successful refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    pub healthy: usize,
    pub unhealthy: usize,
}

/// Service name → healthy endpoint list.
#[derive(Debug, Default)]
pub struct ServiceCache {
    pools: DashMap<String, Arc<Mutex<ServicePool>>>,
}

impl ServiceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with exclusive access to one service's pool.
    ///
    /// Returns `None` when the service has never been cached.
    pub fn with_pool<R>(&self, service: &str, f: impl FnOnce(&mut ServicePool) -> R) -> Option<R> {
        // Clone the handle so the map shard is released before the pool lock is taken.
        let pool = self.pools.get(service).map(|entry| entry.value().clone())?;
        let mut guard = pool.lock().unwrap_or_else(PoisonError::into_inner);
        Some(f(&mut guard))
    }

    /// Swap in a new endpoint list for `service`.
    pub fn replace(&self, service: &str, endpoints: Vec<Endpoint>) {
        let endpoints: Arc<[Endpoint]> = endpoints.into();

        let pool = self
            .pools
            .entry(service.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(ServicePool {
                    endpoints: Arc::from(Vec::new()),
                    cursor: 0,
                }))
            })
            .value()
            .clone();

        let mut guard = pool.lock().unwrap_or_else(PoisonError::into_inner);
        guard.endpoints = endpoints;
        if guard.cursor >= guard.endpoints.len() {
            guard.cursor = 0;
        }
    }

    /// Current endpoint list for `service`.
    pub fn snapshot(&self, service: &str) -> Option<Arc<[Endpoint]>> {
        self.with_pool(service, |pool| pool.endpoints.clone())
    }

    /// Names of every cached service, sorted.
    pub fn services(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pools.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Drop services that are no longer monitored.
    pub fn retain_services(&self, keep: &[String]) {
        self.pools.retain(|name, _| keep.iter().any(|k| k == name));
    }

    /// Query the registry for `service` and replace its healthy list.
    ///
    /// On error the previous list stays in place.
    pub async fn refresh(
        &self,
        registry: &dyn ServiceRegistry,
        service: &str,
        timeout: Duration,
    ) -> Result<RefreshSummary, RegistryError> {
        let outcome = with_deadline(timeout, registry.list_instances(service))
            .await
            .map_err(|_| RegistryError::Timeout(timeout))
            .and_then(|result| result);

        let instances = match outcome {
            Ok(instances) => instances,
            Err(e) => {
                tracing::warn!(service, error = %e, "Service refresh failed, keeping previous endpoints");
                metrics::record_refresh_failure(service);
                return Err(e);
            }
        };

        let (healthy, unhealthy): (Vec<_>, Vec<_>) =
            instances.into_iter().partition(|i| i.is_healthy());

        let endpoints: Vec<Endpoint> = healthy
            .iter()
            .filter_map(|instance| match Endpoint::try_from(instance) {
                Ok(endpoint) => Some(endpoint),
                Err(e) => {
                    tracing::warn!(
                        service,
                        instance = %instance.id,
                        address = %instance.address,
                        error = %e,
                        "Skipping instance with unusable address"
                    );
                    None
                }
            })
            .collect();

        let summary = RefreshSummary {
            healthy: endpoints.len(),
            unhealthy: unhealthy.len(),
        };
        self.replace(service, endpoints);

        tracing::info!(
            service,
            healthy = summary.healthy,
            unhealthy = summary.unhealthy,
            "Service cache refreshed"
        );
        metrics::record_healthy_endpoints(service, summary.healthy);
        Ok(summary)
    }
}
