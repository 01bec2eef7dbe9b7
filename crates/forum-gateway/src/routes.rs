//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use forum_auth::JwtValidator;

use crate::error::handle_panic;
use crate::handlers::{health, not_found};
use crate::proxy;
use crate::state::GatewayState;

/// Create the gateway router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /` - Health check
///
/// ## Forwarded
/// - every other request is resolved against the route table by
///   [`proxy::forward`]; unmatched paths get 404
pub fn create_router<V>(state: GatewayState<V>) -> Router
where
    V: JwtValidator + 'static,
{
    let cors = build_cors_layer(&state.config.cors_origins);

    let state = Arc::new(state);

    Router::new()
        // Health (public)
        .route("/", get(health::health).fallback(not_found))
        // Everything else goes upstream
        .fallback(proxy::forward::<V>)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
