//! Consul health API client.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::discovery::registry::{
    HealthCheck, RegistryError, ServiceInstance, ServiceRegistry,
};

/// Registry backed by Consul's `/v1/health/service/{name}` endpoint.
pub struct ConsulRegistry {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl ConsulRegistry {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RegistryError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            timeout,
        })
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, RegistryError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                RegistryError::Timeout(self.timeout)
            } else {
                RegistryError::Http(e)
            }
        })?;

        if !response.status().is_success() {
            return Err(RegistryError::Status {
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ServiceRegistry for ConsulRegistry {
    async fn list_instances(&self, service: &str) -> Result<Vec<ServiceInstance>, RegistryError> {
        let response = self.get(&format!("/v1/health/service/{service}")).await?;
        let body = response.bytes().await?;
        let instances = parse_health_response(&body)?;

        tracing::debug!(
            service,
            instances = instances.len(),
            "Fetched instances from Consul"
        );
        Ok(instances)
    }

    async fn ping(&self) -> Result<(), RegistryError> {
        self.get("/v1/status/leader").await.map(|_| ())
    }
}

#[derive(Deserialize)]
struct HealthEntry {
    #[serde(rename = "Node", default)]
    node: Option<NodeDetail>,
    #[serde(rename = "Service")]
    service: ServiceDetail,
    #[serde(rename = "Checks", default)]
    checks: Vec<CheckDetail>,
}

#[derive(Deserialize)]
struct NodeDetail {
    #[serde(rename = "Address", default)]
    address: String,
}

#[derive(Deserialize)]
struct ServiceDetail {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Address", default)]
    address: String,
    #[serde(rename = "Port")]
    port: u16,
}

#[derive(Deserialize)]
struct CheckDetail {
    #[serde(rename = "CheckID", default)]
    check_id: String,
    #[serde(rename = "Status")]
    status: String,
}

/// Decode a `/v1/health/service/{name}` body.
///
/// Consul leaves `Service.Address` empty when the service registered without
/// one; the node address is used instead.
pub fn parse_health_response(body: &[u8]) -> Result<Vec<ServiceInstance>, RegistryError> {
    let entries: Vec<HealthEntry> = serde_json::from_slice(body)?;

    Ok(entries
        .into_iter()
        .map(|entry| {
            let address = if entry.service.address.is_empty() {
                entry.node.map(|n| n.address).unwrap_or_default()
            } else {
                entry.service.address
            };

            ServiceInstance {
                id: entry.service.id,
                address,
                port: entry.service.port,
                checks: entry
                    .checks
                    .into_iter()
                    .map(|c| HealthCheck {
                        check_id: c.check_id,
                        status: c.status,
                    })
                    .collect(),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"[
        {
            "Node": {"Node": "node-a", "Address": "10.0.0.10"},
            "Service": {"ID": "users-1", "Service": "user-management-service", "Address": "10.0.1.1", "Port": 5000},
            "Checks": [
                {"CheckID": "serfHealth", "Status": "passing"},
                {"CheckID": "service:users-1", "Status": "passing"}
            ]
        },
        {
            "Node": {"Node": "node-b", "Address": "10.0.0.11"},
            "Service": {"ID": "users-2", "Service": "user-management-service", "Address": "", "Port": 5001},
            "Checks": [
                {"CheckID": "serfHealth", "Status": "passing"},
                {"CheckID": "service:users-2", "Status": "critical"}
            ]
        }
    ]"#;

    #[test]
    fn test_parse_health_response() {
        let instances = parse_health_response(BODY.as_bytes()).unwrap();
        assert_eq!(instances.len(), 2);

        assert_eq!(instances[0].id, "users-1");
        assert_eq!(instances[0].url(), "http://10.0.1.1:5000");
        assert!(instances[0].is_healthy());

        assert_eq!(instances[1].address, "10.0.0.11", "falls back to node address");
        assert!(!instances[1].is_healthy());
        assert_eq!(instances[1].checks[1].check_id, "service:users-2");
    }

    #[test]
    fn test_malformed_response() {
        let err = parse_health_response(b"{\"not\": \"a list\"}").unwrap_err();
        assert!(matches!(err, RegistryError::Decode(_)));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let registry = ConsulRegistry::new("http://consul:8500/", Duration::from_secs(1)).unwrap();
        assert_eq!(registry.base_url, "http://consul:8500");
    }
}
