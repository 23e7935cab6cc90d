//! Service registry abstraction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status string a health check reports when it passes.
pub const PASSING: &str = "passing";

/// One health check attached to an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub check_id: String,
    pub status: String,
}

impl HealthCheck {
    pub fn passing(check_id: impl Into<String>) -> Self {
        Self {
            check_id: check_id.into(),
            status: PASSING.to_string(),
        }
    }

    pub fn critical(check_id: impl Into<String>) -> Self {
        Self {
            check_id: check_id.into(),
            status: "critical".to_string(),
        }
    }

    pub fn is_passing(&self) -> bool {
        self.status == PASSING
    }
}

/// A registered instance of a service, as reported by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub id: String,
    pub address: String,
    pub port: u16,
    pub checks: Vec<HealthCheck>,
}

impl ServiceInstance {
    /// Healthy iff every health check reports passing.
    pub fn is_healthy(&self) -> bool {
        self.checks.iter().all(HealthCheck::is_passing)
    }

    /// Base URL the gateway uses to reach this instance.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.address, self.port)
    }
}

/// Errors talking to a service registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("registry returned status {status}")]
    Status { status: u16 },

    #[error("malformed registry response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("registry did not answer within {0:?}")]
    Timeout(std::time::Duration),

    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

/// Answers "which instances of a service exist, and are they healthy?".
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    /// All instances of `service`, healthy or not.
    async fn list_instances(&self, service: &str) -> Result<Vec<ServiceInstance>, RegistryError>;

    /// Check that the registry itself is reachable.
    async fn ping(&self) -> Result<(), RegistryError>;
}
