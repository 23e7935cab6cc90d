//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::resilience::circuit_breaker::BreakerSettings;

/// Service that owns user accounts and logins.
pub const USER_SERVICE: &str = "user-management-service";

/// Service that owns calendars.
pub const CALENDAR_SERVICE: &str = "calendar-service";

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Service registry the endpoint cache is refreshed from.
    pub registry: RegistryConfig,

    /// Downstream services monitored by the refresher.
    pub services: Vec<ServiceConfig>,

    /// Default circuit breaker thresholds.
    pub breaker: BreakerConfig,

    /// Dispatcher retry configuration.
    pub retries: RetryConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Path prefix routes mapping requests to services.
    pub routes: Vec<RouteConfig>,

    /// Saga orchestration settings.
    pub saga: SagaConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            registry: RegistryConfig::default(),
            services: vec![
                ServiceConfig {
                    name: USER_SERVICE.to_string(),
                    failure_limit: Some(3),
                    open_timeout_secs: Some(30),
                },
                ServiceConfig {
                    name: CALENDAR_SERVICE.to_string(),
                    failure_limit: Some(3),
                    open_timeout_secs: Some(5),
                },
            ],
            breaker: BreakerConfig::default(),
            retries: RetryConfig::default(),
            timeouts: TimeoutConfig::default(),
            routes: vec![
                RouteConfig {
                    name: "user".to_string(),
                    path_prefix: "/api/user/".to_string(),
                    service: USER_SERVICE.to_string(),
                },
                RouteConfig {
                    name: "calendar".to_string(),
                    path_prefix: "/api/calendar/".to_string(),
                    service: CALENDAR_SERVICE.to_string(),
                },
            ],
            saga: SagaConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Names of every monitored service, in declaration order.
    pub fn service_names(&self) -> Vec<String> {
        self.services.iter().map(|s| s.name.clone()).collect()
    }

    /// Breaker thresholds for `service`: per-service overrides on top of the defaults.
    pub fn breaker_settings(&self, service: &str) -> BreakerSettings {
        let declared = self.services.iter().find(|s| s.name == service);
        let failure_limit = declared
            .and_then(|s| s.failure_limit)
            .unwrap_or(self.breaker.failure_limit);
        let open_timeout_secs = declared
            .and_then(|s| s.open_timeout_secs)
            .unwrap_or(self.breaker.open_timeout_secs);

        BreakerSettings {
            failure_limit,
            open_timeout: Duration::from_secs(open_timeout_secs),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Which registry implementation backs discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RegistryKind {
    /// Consul health API.
    #[default]
    Consul,
    /// Instances listed in this file.
    Static,
}

/// Service registry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Registry implementation.
    pub kind: RegistryKind,

    /// Base URL of the Consul agent.
    pub address: String,

    /// Interval between cache refresh cycles in seconds.
    pub refresh_interval_secs: u64,

    /// Timeout for a single registry query in seconds.
    pub timeout_secs: u64,

    /// Instances served by the static registry.
    pub static_instances: Vec<StaticInstanceConfig>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            kind: RegistryKind::Consul,
            address: "http://consul:8500".to_string(),
            refresh_interval_secs: 30,
            timeout_secs: 5,
            static_instances: Vec::new(),
        }
    }
}

/// A statically declared service instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StaticInstanceConfig {
    /// Service this instance belongs to.
    pub service: String,

    /// Unique instance identifier.
    pub id: String,

    /// Host or IP address.
    pub address: String,

    /// Port number.
    pub port: u16,

    /// Whether the instance reports a passing health check.
    #[serde(default = "default_passing")]
    pub passing: bool,
}

fn default_passing() -> bool {
    true
}

/// A monitored downstream service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Service name as known to the registry.
    pub name: String,

    /// Consecutive failures before the breaker opens (falls back to `breaker.failure_limit`).
    #[serde(default)]
    pub failure_limit: Option<u32>,

    /// Open-state cooldown in seconds (falls back to `breaker.open_timeout_secs`).
    #[serde(default)]
    pub open_timeout_secs: Option<u64>,
}

/// Default circuit breaker thresholds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures before the breaker opens.
    pub failure_limit: u32,

    /// Seconds the breaker stays open before allowing a probe.
    pub open_timeout_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_limit: 3,
            open_timeout_secs: 30,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts per dispatch (first attempt included).
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 50,
            max_delay_ms: 1000,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Timeout of a single outbound attempt in milliseconds.
    pub upstream_ms: u64,

    /// Total time allowed for an inbound request in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            upstream_ms: 2000,
            request_secs: 30,
        }
    }
}

/// Route configuration mapping a path prefix to a service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging.
    pub name: String,

    /// Path prefix to match.
    pub path_prefix: String,

    /// Service requests are dispatched to.
    pub service: String,
}

/// Saga orchestration settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SagaConfig {
    /// Deadline for the forward steps of a saga in seconds (0 disables it).
    pub deadline_secs: u64,
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self { deadline_secs: 60 }
    }
}

impl SagaConfig {
    /// The deadline as a duration, if enabled.
    pub fn deadline(&self) -> Option<Duration> {
        (self.deadline_secs > 0).then(|| Duration::from_secs(self.deadline_secs))
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
