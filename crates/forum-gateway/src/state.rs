//! Gateway application state.
//!
//! This module defines the shared state that is available to all request handlers.

use std::sync::Arc;

use forum_auth::JwtValidator;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::route_table::RouteTable;

/// Shared application state for the gateway.
///
/// Everything here is read-only once the server starts.
pub struct GatewayState<V>
where
    V: JwtValidator,
{
    /// The mounted upstream routes.
    pub routes: Arc<RouteTable>,
    /// The JWT validator for authentication.
    pub jwt_validator: Arc<V>,
    /// Pooled client used for every upstream call.
    pub http_client: reqwest::Client,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl<V> GatewayState<V>
where
    V: JwtValidator,
{
    /// Create a new gateway state, mounting routes from `config.services`.
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream HTTP client cannot be built.
    pub fn new(jwt_validator: Arc<V>, config: GatewayConfig) -> Result<Self, GatewayError> {
        let routes = RouteTable::from_services(&config.services);
        Self::with_routes(routes, jwt_validator, config)
    }

    /// Create a new gateway state with an explicit route table.
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream HTTP client cannot be built.
    pub fn with_routes(
        routes: RouteTable,
        jwt_validator: Arc<V>,
        config: GatewayConfig,
    ) -> Result<Self, GatewayError> {
        // Redirects belong to the client, not the gateway.
        let http_client = reqwest::Client::builder()
            .timeout(config.upstream_timeout())
            .connect_timeout(config.upstream_connect_timeout())
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            routes: Arc::new(routes),
            jwt_validator,
            http_client,
            config,
        })
    }
}

impl<V> Clone for GatewayState<V>
where
    V: JwtValidator,
{
    fn clone(&self) -> Self {
        Self {
            routes: Arc::clone(&self.routes),
            jwt_validator: Arc::clone(&self.jwt_validator),
            http_client: self.http_client.clone(),
            config: self.config.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceUrls;
    use forum_auth::MockJwtValidator;

    #[test]
    fn state_mounts_configured_services() {
        let config = GatewayConfig {
            services: ServiceUrls {
                post: Some("http://posts:5002".to_string()),
                auth: Some("http://auth:5000".to_string()),
                ..ServiceUrls::default()
            },
            ..GatewayConfig::default()
        };

        let state = GatewayState::new(Arc::new(MockJwtValidator), config).unwrap();
        assert_eq!(state.routes.len(), 2);

        let cloned = state.clone();
        assert!(Arc::ptr_eq(&state.routes, &cloned.routes));
    }
}
