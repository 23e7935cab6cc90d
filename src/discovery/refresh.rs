//! Background cache refresh.
//!
//! # Responsibilities
//! - Periodically refresh every monitored service from the registry
//! - Follow config reloads (service list, interval, registry timeout)
//! - Stop promptly on shutdown, even mid-refresh

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::config::LiveConfig;
use crate::discovery::cache::{RefreshSummary, ServiceCache};
use crate::discovery::registry::ServiceRegistry;

/// Keeps the [`ServiceCache`] in step with the registry.
pub struct CacheRefresher {
    cache: Arc<ServiceCache>,
    registry: Arc<dyn ServiceRegistry>,
    config: LiveConfig,
}

impl CacheRefresher {
    pub fn new(cache: Arc<ServiceCache>, registry: Arc<dyn ServiceRegistry>, config: LiveConfig) -> Self {
        Self {
            cache,
            registry,
            config,
        }
    }

    /// Refresh on a fixed interval until shutdown is signalled.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut interval = self.interval();
        tracing::info!(interval = ?interval, "Cache refresher starting");

        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let cycle = async {
                ticker.tick().await;
                self.refresh_all().await;
            };

            tokio::select! {
                _ = cycle => {}
                _ = shutdown.recv() => {
                    tracing::info!("Cache refresher received shutdown signal, exiting loop");
                    break;
                }
            }

            let configured = self.interval();
            if configured != interval {
                tracing::info!(from = ?interval, to = ?configured, "Refresh interval changed");
                interval = configured;
                ticker = time::interval_at(time::Instant::now() + interval, interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            }
        }
    }

    /// Refresh every monitored service once, concurrently.
    pub async fn refresh_all(&self) -> Vec<(String, Option<RefreshSummary>)> {
        let config = self.config.load();
        let services = config.service_names();
        let timeout = Duration::from_secs(config.registry.timeout_secs);
        drop(config);

        self.cache.retain_services(&services);

        let mut tasks = tokio::task::JoinSet::new();
        for service in services {
            let cache = self.cache.clone();
            let registry = self.registry.clone();
            tasks.spawn(async move {
                let summary = cache.refresh(registry.as_ref(), &service, timeout).await.ok();
                (service, summary)
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => tracing::error!(error = %e, "Refresh task failed"),
            }
        }
        results.sort_by(|a, b| a.0.cmp(&b.0));
        results
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.config.load().registry.refresh_interval_secs.max(1))
    }
}
