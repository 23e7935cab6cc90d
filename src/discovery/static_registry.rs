//! In-memory registry for local runs and tests.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::config::StaticInstanceConfig;
use crate::discovery::registry::{HealthCheck, RegistryError, ServiceInstance, ServiceRegistry};

/// Registry whose instances are set directly rather than discovered.
#[derive(Default)]
pub struct StaticRegistry {
    instances: RwLock<HashMap<String, Vec<ServiceInstance>>>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the `registry.static_instances` config section.
    pub fn from_config(entries: &[StaticInstanceConfig]) -> Self {
        let mut instances: HashMap<String, Vec<ServiceInstance>> = HashMap::new();
        for entry in entries {
            let check = if entry.passing {
                HealthCheck::passing(format!("service:{}", entry.id))
            } else {
                HealthCheck::critical(format!("service:{}", entry.id))
            };
            instances
                .entry(entry.service.clone())
                .or_default()
                .push(ServiceInstance {
                    id: entry.id.clone(),
                    address: entry.address.clone(),
                    port: entry.port,
                    checks: vec![check],
                });
        }
        Self {
            instances: RwLock::new(instances),
        }
    }

    /// Replace the instances of one service.
    pub async fn set_instances(&self, service: &str, instances: Vec<ServiceInstance>) {
        self.instances
            .write()
            .await
            .insert(service.to_string(), instances);
    }
}

#[async_trait]
impl ServiceRegistry for StaticRegistry {
    async fn list_instances(&self, service: &str) -> Result<Vec<ServiceInstance>, RegistryError> {
        Ok(self
            .instances
            .read()
            .await
            .get(service)
            .cloned()
            .unwrap_or_default())
    }

    async fn ping(&self) -> Result<(), RegistryError> {
        Ok(())
    }
}
