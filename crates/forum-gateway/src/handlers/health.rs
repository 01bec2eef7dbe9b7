//! Health check endpoint.
//!
//! This module provides the public health check endpoint.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Human-readable status line.
    pub message: &'static str,
}

/// Health check handler.
///
/// This endpoint is public and never forwarded.
///
/// # Example
///
/// ```text
/// GET /
///
/// Response: 200 OK
/// {
///   "message": "API Gateway is running"
/// }
/// ```
pub async fn health() -> impl IntoResponse {
    let response = HealthResponse {
        message: "API Gateway is running",
    };

    (StatusCode::OK, Json(response))
}
