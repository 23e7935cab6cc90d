//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled path-prefix routes
//! - Resolve a request path to the service that owns it
//! - Return an explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Longest prefix wins, so `/api/user/admin/` can override `/api/user/`
//! - Path matching is case-sensitive

use crate::config::RouteConfig;

/// A compiled route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub name: String,
    pub path_prefix: String,
    pub service: String,
}

/// Path-prefix routes, ordered longest prefix first.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn from_config(configs: &[RouteConfig]) -> Self {
        let mut routes: Vec<Route> = configs
            .iter()
            .map(|c| Route {
                name: c.name.clone(),
                path_prefix: c.path_prefix.clone(),
                service: c.service.clone(),
            })
            .collect();

        // Stable sort keeps config order among equal-length prefixes.
        routes.sort_by(|a, b| b.path_prefix.len().cmp(&a.path_prefix.len()));

        for route in &routes {
            tracing::debug!(route = %route.name, prefix = %route.path_prefix, service = %route.service, "Route registered");
        }
        Self { routes }
    }

    /// The route owning `path`, if any.
    pub fn resolve(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|r| path.starts_with(&r.path_prefix))
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}
