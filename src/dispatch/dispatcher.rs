//! Request dispatcher: load balancing + circuit breaking + bounded retries.
//!
//! # Data Flow
//! ```text
//! dispatch(service, request)
//!     for attempt in 1..=max_attempts:
//!         → backoff pause (none before the first attempt)
//!         → LoadBalancer::select (NotFound ends the dispatch at once; after a
//!           failed attempt it ends as ServiceUnavailable with that attempt's error)
//!         → CircuitBreaker::call(one outbound attempt under the upstream timeout)
//!         → success: return the response
//!         → failure: log, record, next attempt with a freshly selected endpoint
//!     → ServiceUnavailable wrapping the last attempt's error
//! ```
//!
//! # Design Decisions
//! - Only 5xx responses, transport errors and timeouts count as failures;
//!   4xx responses are the service's answer and are relayed
//! - Retry and timeout settings are read from the live config per dispatch

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::LiveConfig;
use crate::dispatch::error::{AttemptError, DispatchError};
use crate::dispatch::upstream::{Upstream, UpstreamError, UpstreamRequest, UpstreamResponse};
use crate::load_balancer::{Endpoint, LoadBalancer, SelectError};
use crate::observability::metrics;
use crate::resilience::{BreakerRegistry, RetryPolicy};

/// Calls logical services on behalf of routes and saga steps.
pub struct RequestDispatcher {
    balancer: Arc<LoadBalancer>,
    breakers: Arc<BreakerRegistry>,
    upstream: Arc<dyn Upstream>,
    config: LiveConfig,
}

impl RequestDispatcher {
    pub fn new(
        balancer: Arc<LoadBalancer>,
        breakers: Arc<BreakerRegistry>,
        upstream: Arc<dyn Upstream>,
        config: LiveConfig,
    ) -> Self {
        Self {
            balancer,
            breakers,
            upstream,
            config,
        }
    }

    pub fn breakers(&self) -> &Arc<BreakerRegistry> {
        &self.breakers
    }

    /// Send `request` to some healthy instance of `service`.
    pub async fn dispatch(
        &self,
        service: &str,
        request: &UpstreamRequest,
    ) -> Result<UpstreamResponse, DispatchError> {
        let (policy, timeout) = {
            let config = self.config.load();
            (
                RetryPolicy::from(&config.retries),
                Duration::from_millis(config.timeouts.upstream_ms),
            )
        };
        let started = Instant::now();
        let mut attempt = 1;
        let mut last_error: Option<AttemptError> = None;

        loop {
            let delay = policy.delay_before(attempt);
            if !delay.is_zero() {
                tracing::debug!(service, attempt, delay = ?delay, "Backing off before retry");
                tokio::time::sleep(delay).await;
            }

            let endpoint = match self.balancer.select(service) {
                Ok(endpoint) => endpoint,
                Err(SelectError::NotFound(_)) => {
                    tracing::warn!(service, attempt, "No healthy endpoint for service");
                    metrics::record_dispatch_attempt(service, "no_endpoint");
                    metrics::record_dispatch_duration(service, started);
                    // Endpoints vanished mid-dispatch: report the failure that got us here.
                    return Err(match last_error {
                        Some(source) => DispatchError::ServiceUnavailable {
                            service: service.to_string(),
                            attempts: attempt - 1,
                            source,
                        },
                        None => DispatchError::NoHealthyEndpoint {
                            service: service.to_string(),
                        },
                    });
                }
            };

            let breaker = self.breakers.get(service);
            let outcome = breaker
                .call(|| self.attempt(&endpoint, request, timeout))
                .await
                .map_err(AttemptError::from);

            match outcome {
                Ok(response) => {
                    tracing::debug!(
                        service,
                        endpoint = %endpoint,
                        attempt,
                        status = %response.status,
                        "Dispatch succeeded"
                    );
                    metrics::record_dispatch_attempt(service, "success");
                    metrics::record_dispatch_duration(service, started);
                    return Ok(response);
                }
                Err(error) => {
                    tracing::warn!(
                        service,
                        endpoint = %endpoint,
                        attempt,
                        max_attempts = policy.max_attempts,
                        error = %error,
                        "Dispatch attempt failed"
                    );
                    metrics::record_dispatch_attempt(service, error.outcome());

                    if attempt >= policy.max_attempts {
                        metrics::record_dispatch_duration(service, started);
                        return Err(DispatchError::ServiceUnavailable {
                            service: service.to_string(),
                            attempts: attempt,
                            source: error,
                        });
                    }
                    last_error = Some(error);
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt(
        &self,
        endpoint: &Endpoint,
        request: &UpstreamRequest,
        timeout: Duration,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let response = self.upstream.send(endpoint, request, timeout).await?;
        if response.status.is_server_error() {
            return Err(UpstreamError::Status {
                status: response.status.as_u16(),
            });
        }
        Ok(response)
    }
}
