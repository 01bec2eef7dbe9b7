//! Authentication filter.
//!
//! Decides, per route, whether a request must carry a bearer token and
//! verifies it when it must.

use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, Method};

use forum_auth::{IdentityClaims, JwtValidator};

use crate::error::ApiError;
use crate::route_table::RouteEntry;

/// Extract the token from an `Authorization: Bearer <token>` header.
///
/// Returns `None` if the header is absent, not valid UTF-8, uses another
/// scheme, or carries an empty token.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authenticate a request against its resolved route.
///
/// Returns `Ok(None)` when the route or a bypass rule exempts the request;
/// verification is skipped entirely in that case, even if a token is present.
///
/// # Errors
///
/// Returns [`ApiError::AuthMissing`] when a required token is absent and
/// [`ApiError::AuthInvalid`] when it fails verification.
pub async fn authenticate<V>(
    validator: &V,
    route: &RouteEntry,
    method: &Method,
    path: &str,
    headers: &HeaderMap,
) -> Result<Option<IdentityClaims>, ApiError>
where
    V: JwtValidator + ?Sized,
{
    if !route.requires_auth(method, path) {
        tracing::debug!(%method, path, prefix = route.prefix(), "Skipping authentication");
        return Ok(None);
    }

    let token = bearer_token(headers).ok_or(ApiError::AuthMissing)?;
    let claims = validator.validate(token).await?;

    tracing::debug!(
        user_id = %claims.user_id,
        role = %claims.role,
        verified = claims.verified,
        active = claims.active,
        expires_at = %claims.expires_at,
        "Authenticated request"
    );

    Ok(Some(claims))
}
