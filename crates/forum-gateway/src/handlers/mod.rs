//! HTTP request handlers served by the gateway itself.
//!
//! Everything else is forwarded by [`crate::proxy`].

pub mod health;

use crate::error::ApiError;

/// Handler for gateway-owned paths hit with an unsupported method.
pub async fn not_found() -> ApiError {
    ApiError::RouteNotFound
}
