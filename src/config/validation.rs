//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (routes and static instances reference declared services)
//! - Validate value ranges (attempts, limits and intervals > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system, including on hot reload

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("retries.max_attempts must be at least 1")]
    ZeroRetryAttempts,

    #[error("failure limit for '{0}' must be at least 1")]
    ZeroFailureLimit(String),

    #[error("registry.refresh_interval_secs must be greater than 0")]
    ZeroRefreshInterval,

    #[error("registry.timeout_secs must be greater than 0")]
    ZeroRegistryTimeout,

    #[error("timeouts.upstream_ms must be greater than 0")]
    ZeroUpstreamTimeout,

    #[error("service '{0}' is declared more than once")]
    DuplicateService(String),

    #[error("route '{route}' targets undeclared service '{service}'")]
    UnknownRouteService { route: String, service: String },

    #[error("route '{0}' has a path prefix that does not start with '/'")]
    InvalidPathPrefix(String),

    #[error("static instance '{id}' belongs to undeclared service '{service}'")]
    UnknownInstanceService { id: String, service: String },

    #[error("{field} is not a valid socket address: '{value}'")]
    InvalidAddress { field: &'static str, value: String },
}

/// Check a parsed configuration, collecting every error found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::ZeroRetryAttempts);
    }
    if config.breaker.failure_limit == 0 {
        errors.push(ValidationError::ZeroFailureLimit("breaker".to_string()));
    }
    if config.registry.refresh_interval_secs == 0 {
        errors.push(ValidationError::ZeroRefreshInterval);
    }
    if config.registry.timeout_secs == 0 {
        errors.push(ValidationError::ZeroRegistryTimeout);
    }
    if config.timeouts.upstream_ms == 0 {
        errors.push(ValidationError::ZeroUpstreamTimeout);
    }

    let mut declared = HashSet::new();
    for service in &config.services {
        if !declared.insert(service.name.as_str()) {
            errors.push(ValidationError::DuplicateService(service.name.clone()));
        }
        if service.failure_limit == Some(0) {
            errors.push(ValidationError::ZeroFailureLimit(service.name.clone()));
        }
    }

    for route in &config.routes {
        if !route.path_prefix.starts_with('/') {
            errors.push(ValidationError::InvalidPathPrefix(route.name.clone()));
        }
        if !declared.contains(route.service.as_str()) {
            errors.push(ValidationError::UnknownRouteService {
                route: route.name.clone(),
                service: route.service.clone(),
            });
        }
    }

    for instance in &config.registry.static_instances {
        if !declared.contains(instance.service.as_str()) {
            errors.push(ValidationError::UnknownInstanceService {
                id: instance.id.clone(),
                service: instance.service.clone(),
            });
        }
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
