//! API error types and responses.
//!
//! Only gateway-originated failures are rendered here. Errors produced by
//! upstream services are streamed back untouched by the forwarder.

use std::any::Any;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use forum_auth::AuthError;

/// API error type that implements `IntoResponse`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No usable `Authorization: Bearer` header.
    #[error("missing or invalid authorization header")]
    AuthMissing,

    /// The bearer token failed verification.
    #[error("invalid or expired token")]
    AuthInvalid,

    /// The caller is authenticated but not allowed.
    ///
    /// Raised by upstream services from the identity headers; the gateway
    /// itself never short-circuits on roles.
    #[error("forbidden")]
    AuthForbidden,

    /// No mounted prefix matches the request path.
    #[error("route not found")]
    RouteNotFound,

    /// A JSON request body could not be parsed.
    #[error("malformed JSON body: {0}")]
    MalformedBody(String),

    /// The request body exceeded the configured limit.
    #[error("payload too large")]
    PayloadTooLarge,

    /// The upstream could not be reached or the exchange broke off.
    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    /// Any other failure while handling the request.
    #[error("unhandled error: {0}")]
    Unhandled(String),
}

/// Error response body.
///
/// Field names follow what forum clients already read: `error` for
/// authentication failures, `message` (plus optional `error` detail) otherwise.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ApiError {
    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::AuthMissing | Self::AuthInvalid => StatusCode::UNAUTHORIZED,
            Self::AuthForbidden => StatusCode::FORBIDDEN,
            Self::RouteNotFound => StatusCode::NOT_FOUND,
            Self::MalformedBody(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UpstreamUnreachable(_) | Self::Unhandled(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn body(&self) -> ErrorResponse {
        match self {
            Self::AuthMissing => ErrorResponse {
                message: None,
                error: Some("Missing or invalid Authorization header.".to_string()),
            },
            Self::AuthInvalid => ErrorResponse {
                message: None,
                error: Some("Invalid or expired token.".to_string()),
            },
            Self::AuthForbidden => ErrorResponse {
                message: None,
                error: Some("Forbidden".to_string()),
            },
            Self::RouteNotFound => ErrorResponse {
                message: Some("Route not found"),
                error: None,
            },
            Self::MalformedBody(_) => ErrorResponse {
                message: Some("Invalid JSON body"),
                error: None,
            },
            Self::PayloadTooLarge => ErrorResponse {
                message: Some("Payload Too Large"),
                error: None,
            },
            Self::UpstreamUnreachable(detail) => ErrorResponse {
                message: Some("Proxy error"),
                error: Some(detail.clone()),
            },
            Self::Unhandled(_) => ErrorResponse {
                message: Some("Internal Server Error"),
                error: None,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Unhandled(detail) = &self {
            tracing::error!(error = %detail, "Global error handler");
        }

        (self.status_code(), Json(self.body())).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        if err.is_configuration() {
            return Self::Unhandled(err.to_string());
        }

        tracing::debug!(error = %err, "Invalid or expired token");
        Self::AuthInvalid
    }
}

/// Catch-all for panics escaping a handler.
///
/// Used with `tower_http::catch_panic::CatchPanicLayer`. The panic payload is
/// logged but never returned to the client.
#[allow(clippy::needless_pass_by_value)]
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| payload.downcast_ref::<&str>().map(ToString::to_string))
        .unwrap_or_else(|| "unknown panic".to_string());

    ApiError::Unhandled(detail).into_response()
}

/// Errors that prevent the gateway from starting.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Token verification is misconfigured.
    #[error("auth configuration: {0}")]
    Auth(#[from] AuthError),

    /// The upstream HTTP client could not be built.
    #[error("http client: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Binding or serving the listener failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
