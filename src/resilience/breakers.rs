//! Per-service breaker registry.

use dashmap::DashMap;
use std::sync::Arc;

use crate::config::LiveConfig;
use crate::resilience::circuit_breaker::{BreakerSnapshot, CircuitBreaker};

/// One [`CircuitBreaker`] per service, created on first use.
///
/// Thresholds come from the configuration at creation time; a breaker keeps
/// its settings until the process restarts.
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    config: LiveConfig,
}

impl BreakerRegistry {
    pub fn new(config: LiveConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            config,
        }
    }

    /// The breaker for `service`, creating it if needed.
    pub fn get(&self, service: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(service) {
            return existing.clone();
        }

        self.breakers
            .entry(service.to_string())
            .or_insert_with(|| {
                let settings = self.config.load().breaker_settings(service);
                tracing::debug!(
                    service,
                    failure_limit = settings.failure_limit,
                    open_timeout = ?settings.open_timeout,
                    "Created circuit breaker"
                );
                Arc::new(CircuitBreaker::new(service, settings))
            })
            .clone()
    }

    /// Snapshots of every breaker created so far, sorted by service name.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut snapshots: Vec<_> = self
            .breakers
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.service.cmp(&b.service));
        snapshots
    }
}
