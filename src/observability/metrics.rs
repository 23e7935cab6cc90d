//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_dispatch_attempts_total` (counter): attempts by service, outcome
//! - `gateway_dispatch_duration_seconds` (histogram): dispatch latency by service
//! - `gateway_breaker_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `gateway_breaker_rejections_total` (counter): calls failed fast by an open breaker
//! - `gateway_healthy_endpoints` (gauge): cached healthy endpoints per service
//! - `gateway_registry_refresh_failures_total` (counter): failed refreshes per service
//! - `gateway_saga_executions_total` (counter): saga runs by plan, outcome
//! - `gateway_saga_compensations_total` (counter): compensations by plan, outcome
//!
//! Recording is a no-op until `init_metrics` installs the Prometheus recorder.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

use crate::resilience::circuit_breaker::BreakerState;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_dispatch_attempt(service: &str, outcome: &'static str) {
    counter!(
        "gateway_dispatch_attempts_total",
        "service" => service.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_dispatch_duration(service: &str, start: Instant) {
    histogram!("gateway_dispatch_duration_seconds", "service" => service.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_breaker_state(service: &str, state: BreakerState) {
    let value = match state {
        BreakerState::Closed => 0.0,
        BreakerState::Open => 1.0,
        BreakerState::HalfOpen => 2.0,
    };
    gauge!("gateway_breaker_state", "service" => service.to_string()).set(value);
}

pub fn record_breaker_rejection(service: &str) {
    counter!("gateway_breaker_rejections_total", "service" => service.to_string()).increment(1);
}

pub fn record_healthy_endpoints(service: &str, count: usize) {
    gauge!("gateway_healthy_endpoints", "service" => service.to_string()).set(count as f64);
}

pub fn record_refresh_failure(service: &str) {
    counter!("gateway_registry_refresh_failures_total", "service" => service.to_string())
        .increment(1);
}

pub fn record_saga(plan: &str, outcome: &'static str) {
    counter!(
        "gateway_saga_executions_total",
        "plan" => plan.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_compensation(plan: &str, outcome: &'static str) {
    counter!(
        "gateway_saga_compensations_total",
        "plan" => plan.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}
