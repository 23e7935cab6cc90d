//! Endpoint descriptor.

use std::fmt;
use url::Url;

use crate::discovery::registry::ServiceInstance;

/// A healthy instance the gateway can send requests to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Pre-parsed base URL, e.g. `http://10.0.0.5:5000/`.
    pub base_url: Url,
    /// Registry identifier of the instance.
    pub instance_id: String,
}

impl Endpoint {
    pub fn new(base_url: Url, instance_id: impl Into<String>) -> Self {
        Self {
            base_url,
            instance_id: instance_id.into(),
        }
    }

    /// Absolute URL for a request path (which may carry a query string).
    pub fn url_for(&self, path_and_query: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        if path_and_query.starts_with('/') {
            format!("{base}{path_and_query}")
        } else {
            format!("{base}/{path_and_query}")
        }
    }
}

impl TryFrom<&ServiceInstance> for Endpoint {
    type Error = url::ParseError;

    fn try_from(instance: &ServiceInstance) -> Result<Self, Self::Error> {
        Ok(Self::new(Url::parse(&instance.url())?, instance.id.clone()))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base_url.as_str().trim_end_matches('/'))
    }
}
