//! API gateway
//!
//! Single public entry point. For every proxied request the gateway:
//!
//! 1. matches the path against the route table (longest prefix wins)
//! 2. strips any identity headers the client supplied
//! 3. on protected routes, verifies the access token and injects the
//!    identity headers (signed when a gateway secret is configured)
//! 4. forwards the request to the upstream service unchanged otherwise
//!
//! Author: hephaex@gmail.com

pub mod middleware;
pub mod proxy;

pub use middleware::{authenticate, require_gateway_identity};
pub use proxy::{forward, proxy_handler};

use tourbook_core::ServiceUrls;

/// One prefix of the public API and where it is served
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayRoute {
    pub prefix: String,
    pub upstream: String,
    /// Requires a verified access token
    pub protected: bool,
}

impl GatewayRoute {
    pub fn new(prefix: &str, upstream: &str, protected: bool) -> Self {
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
            upstream: upstream.trim_end_matches('/').to_string(),
            protected,
        }
    }

    /// Prefix match on whole path segments
    pub fn matches(&self, path: &str) -> bool {
        path.strip_prefix(self.prefix.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }
}

/// Route table for the public API
///
/// Only the auth endpoints are reachable without a token.
pub fn default_routes(services: &ServiceUrls) -> Vec<GatewayRoute> {
    vec![
        GatewayRoute::new("/api/v1/auth", &services.auth, false),
        GatewayRoute::new("/api/v1/user", &services.user, true),
        GatewayRoute::new("/api/v1/tour", &services.tour, true),
        GatewayRoute::new("/api/v1/booking", &services.booking, true),
        GatewayRoute::new("/api/v1/review", &services.review, true),
    ]
}

pub fn match_route<'a>(routes: &'a [GatewayRoute], path: &str) -> Option<&'a GatewayRoute> {
    routes
        .iter()
        .filter(|route| route.matches(path))
        .max_by_key(|route| route.prefix.len())
}
