//! Reverse proxy forwarder.
//!
//! Every request that is not the health check lands here: the route is
//! resolved, the caller authenticated, identity headers injected, and the
//! request relayed to the upstream. The upstream response is streamed back
//! as-is.
//!
//! Dropping the handler future (client went away) drops the in-flight
//! `reqwest` call with it, and the shared client enforces the per-call
//! timeout.

use std::sync::Arc;

use axum::body::{Body, HttpBody};
use axum::extract::{Request, State};
use axum::http::header::{self, HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, HOST};
use axum::http::{HeaderMap, Method};
use axum::response::Response;
use http_body_util::{LengthLimitError, Limited};

use forum_auth::{IdentityClaims, JwtValidator};

use crate::auth::authenticate;
use crate::error::ApiError;
use crate::state::GatewayState;

/// Header carrying the authenticated user ID.
pub const X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");
/// Header carrying the authenticated user's role.
pub const X_USER_ROLE: HeaderName = HeaderName::from_static("x-user-role");
/// Header carrying `"true"` or `"false"` for the email verification flag.
pub const X_USER_VERIFIED: HeaderName = HeaderName::from_static("x-user-verified");

const IDENTITY_HEADERS: [HeaderName; 3] = [X_USER_ID, X_USER_ROLE, X_USER_VERIFIED];

const HOP_BY_HOP_HEADERS: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Body to send upstream.
#[derive(Debug)]
enum OutboundBody {
    Empty,
    /// Re-serialized JSON document.
    Json(Vec<u8>),
    /// Raw client bytes, relayed chunk by chunk.
    Stream(Body),
}

/// Forward a request to the upstream serving its path.
///
/// # Errors
///
/// Returns an error if the body is over the size limit, no route matches,
/// authentication fails, a JSON body is malformed, or the upstream cannot be
/// reached. Upstream error responses are not errors here; they are relayed
/// verbatim.
pub async fn forward<V>(
    State(state): State<Arc<GatewayState<V>>>,
    request: Request,
) -> Result<Response, ApiError>
where
    V: JwtValidator + 'static,
{
    let (parts, body) = request.into_parts();
    let method = &parts.method;
    let path = parts.uri.path();

    let max_body_bytes = state.config.max_body_bytes;
    if declared_length(&parts.headers).is_some_and(|len| len > max_body_bytes as u64) {
        tracing::debug!(%method, path, max_body_bytes, "Declared body exceeds limit");
        return Err(ApiError::PayloadTooLarge);
    }
    // Bodies without a usable Content-Length are cut off while reading.
    let body = Body::new(Limited::new(body, max_body_bytes));

    let Some(route) = state.routes.resolve(path) else {
        tracing::debug!(%method, path, "No route matches");
        return Err(ApiError::RouteNotFound);
    };

    let identity = authenticate(
        state.jwt_validator.as_ref(),
        route,
        method,
        path,
        &parts.headers,
    )
    .await?;

    let url = route.upstream_url(path, parts.uri.query());
    let mut headers = forwarded_headers(&parts.headers, identity.as_ref())?;
    let body = outbound_body(method, &parts.headers, body, &mut headers).await?;

    tracing::info!(
        %method,
        path,
        upstream = %route.upstream(),
        user_id = ?identity.as_ref().map(|claims| claims.user_id.to_string()),
        "Forwarding request"
    );

    let builder = state
        .http_client
        .request(method.clone(), &url)
        .headers(headers);

    let builder = match body {
        OutboundBody::Empty => builder,
        OutboundBody::Json(bytes) => builder.body(bytes),
        OutboundBody::Stream(body) => {
            builder.body(reqwest::Body::wrap_stream(body.into_data_stream()))
        }
    };

    let upstream = builder.send().await.map_err(|e| {
        if exceeds_limit(&e) {
            tracing::debug!(%method, path, max_body_bytes, "Streamed body exceeds limit");
            return ApiError::PayloadTooLarge;
        }
        tracing::error!(%method, path, upstream = %route.upstream(), error = %e, "Proxy error");
        ApiError::UpstreamUnreachable(e.to_string())
    })?;

    tracing::debug!(%method, path, status = %upstream.status(), "Upstream responded");

    Ok(client_response(upstream))
}

/// Build the header set sent upstream.
///
/// Client headers are copied except hop-by-hop headers, `Host`,
/// `Content-Length` and the identity headers. Identity headers are then set
/// from `identity`; without one only `X-User-Verified: false` is sent.
///
/// # Errors
///
/// Returns [`ApiError::AuthInvalid`] if a claim cannot be encoded as a header value.
pub fn forwarded_headers(
    inbound: &HeaderMap,
    identity: Option<&IdentityClaims>,
) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::with_capacity(inbound.len() + IDENTITY_HEADERS.len());

    for (name, value) in inbound {
        if HOP_BY_HOP_HEADERS.contains(name)
            || IDENTITY_HEADERS.contains(name)
            || *name == HOST
            || *name == CONTENT_LENGTH
        {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    match identity {
        Some(claims) => {
            headers.insert(X_USER_ID, claim_value(&claims.user_id.to_string())?);
            headers.insert(X_USER_ROLE, claim_value(&claims.role)?);
            headers.insert(X_USER_VERIFIED, verified_value(claims.verified));
        }
        None => {
            headers.insert(X_USER_VERIFIED, verified_value(false));
        }
    }

    Ok(headers)
}

fn claim_value(value: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(value).map_err(|_| {
        tracing::warn!("Token claim cannot be sent as a header");
        ApiError::AuthInvalid
    })
}

fn verified_value(verified: bool) -> HeaderValue {
    HeaderValue::from_static(if verified { "true" } else { "false" })
}

/// Returns `true` if the request carries a JSON document.
#[must_use]
pub fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case("application/json"))
}

/// Returns `true` if the body is parsed and re-serialized rather than streamed.
#[must_use]
pub fn rewrites_json(method: &Method, headers: &HeaderMap) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH) && is_json(headers)
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

/// Prepare the upstream body, fixing up `headers` to describe it.
async fn outbound_body(
    method: &Method,
    inbound: &HeaderMap,
    body: Body,
    headers: &mut HeaderMap,
) -> Result<OutboundBody, ApiError> {
    if rewrites_json(method, inbound) {
        let bytes = axum::body::to_bytes(body, usize::MAX)
            .await
            .map_err(|e| body_read_error(&e))?;

        // An absent body is treated as an empty object.
        let document: serde_json::Value = if bytes.is_empty() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_slice(&bytes).map_err(|e| ApiError::MalformedBody(e.to_string()))?
        };

        let serialized =
            serde_json::to_vec(&document).map_err(|e| ApiError::Unhandled(e.to_string()))?;

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(serialized.len()));
        return Ok(OutboundBody::Json(serialized));
    }

    if body.is_end_stream() {
        return Ok(OutboundBody::Empty);
    }

    if let Some(length) = inbound.get(CONTENT_LENGTH) {
        headers.insert(CONTENT_LENGTH, length.clone());
    }
    Ok(OutboundBody::Stream(body))
}

fn body_read_error(err: &axum::Error) -> ApiError {
    if exceeds_limit(err) {
        return ApiError::PayloadTooLarge;
    }
    ApiError::Unhandled(format!("failed to read request body: {err}"))
}

/// Returns `true` if `err` was caused by the request body size limit.
fn exceeds_limit(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut source = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

/// Relay the upstream response: same status, headers minus hop-by-hop, streamed body.
fn client_response(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    for name in &HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use forum_auth::UserIdClaim;

    fn claims(verified: bool) -> IdentityClaims {
        IdentityClaims {
            user_id: UserIdClaim::Numeric(12),
            role: "user".to_string(),
            verified,
            active: true,
            expires_at: Utc::now(),
        }
    }

    fn inbound(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.append(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        headers
    }

    #[test]
    fn identity_headers_replace_client_values() {
        let headers = forwarded_headers(
            &inbound(&[
                ("x-user-id", "1"),
                ("x-user-role", "superadmin"),
                ("x-user-verified", "true"),
                ("authorization", "Bearer abc"),
            ]),
            Some(&claims(false)),
        )
        .unwrap();

        assert_eq!(headers.get_all(X_USER_ID).iter().count(), 1);
        assert_eq!(headers[X_USER_ID], "12");
        assert_eq!(headers[X_USER_ROLE], "user");
        assert_eq!(headers[X_USER_VERIFIED], "false");
        assert_eq!(headers[header::AUTHORIZATION], "Bearer abc");
    }

    #[test]
    fn anonymous_requests_are_marked_unverified() {
        let headers = forwarded_headers(
            &inbound(&[("x-user-id", "1"), ("x-user-verified", "true")]),
            None,
        )
        .unwrap();

        assert!(headers.get(X_USER_ID).is_none());
        assert!(headers.get(X_USER_ROLE).is_none());
        assert_eq!(headers[X_USER_VERIFIED], "false");
    }

    #[test]
    fn verified_claim_is_literal_true() {
        let headers = forwarded_headers(&HeaderMap::new(), Some(&claims(true))).unwrap();
        assert_eq!(headers[X_USER_VERIFIED], "true");
    }

    #[test]
    fn hop_by_hop_and_host_are_dropped() {
        let headers = forwarded_headers(
            &inbound(&[
                ("host", "gateway:5009"),
                ("connection", "keep-alive"),
                ("transfer-encoding", "chunked"),
                ("content-length", "10"),
                ("accept", "application/json"),
                ("cookie", "a=1"),
            ]),
            None,
        )
        .unwrap();

        assert!(headers.get(HOST).is_none());
        assert!(headers.get(header::CONNECTION).is_none());
        assert!(headers.get(header::TRANSFER_ENCODING).is_none());
        assert!(headers.get(CONTENT_LENGTH).is_none());
        assert_eq!(headers[header::ACCEPT], "application/json");
        assert_eq!(headers[header::COOKIE], "a=1");
    }

    #[test]
    fn unencodable_claim_is_rejected() {
        let mut bad = claims(true);
        bad.role = "user\nadmin".to_string();
        assert!(matches!(
            forwarded_headers(&HeaderMap::new(), Some(&bad)),
            Err(ApiError::AuthInvalid)
        ));
    }

    #[test]
    fn json_detection() {
        assert!(is_json(&inbound(&[("content-type", "application/json")])));
        assert!(is_json(&inbound(&[(
            "content-type",
            "Application/JSON; charset=utf-8"
        )])));
        assert!(!is_json(&inbound(&[(
            "content-type",
            "multipart/form-data; boundary=xyz"
        )])));
        assert!(!is_json(&HeaderMap::new()));
    }

    #[test]
    fn only_body_methods_rewrite_json() {
        let json = inbound(&[("content-type", "application/json")]);
        assert!(rewrites_json(&Method::POST, &json));
        assert!(rewrites_json(&Method::PUT, &json));
        assert!(rewrites_json(&Method::PATCH, &json));
        assert!(!rewrites_json(&Method::DELETE, &json));
        assert!(!rewrites_json(&Method::GET, &json));
    }

    #[tokio::test]
    async fn json_body_is_reserialized_with_length() {
        let inbound = inbound(&[("content-type", "application/json")]);
        let mut headers = HeaderMap::new();
        let body = outbound_body(
            &Method::POST,
            &inbound,
            Body::from("{ \"b\" : 2,\n  \"a\" : 1 }"),
            &mut headers,
        )
        .await
        .unwrap();

        let OutboundBody::Json(bytes) = body else {
            panic!("expected JSON body");
        };
        assert_eq!(bytes, br#"{"b":2,"a":1}"#);
        assert_eq!(headers[CONTENT_LENGTH], bytes.len().to_string().as_str());
        assert_eq!(headers[CONTENT_TYPE], "application/json");
    }

    #[tokio::test]
    async fn empty_json_body_becomes_empty_object() {
        let inbound = inbound(&[("content-type", "application/json")]);
        let mut headers = HeaderMap::new();
        let body = outbound_body(&Method::PUT, &inbound, Body::empty(), &mut headers)
            .await
            .unwrap();

        let OutboundBody::Json(bytes) = body else {
            panic!("expected JSON body");
        };
        assert_eq!(bytes, b"{}");
        assert_eq!(headers[CONTENT_LENGTH], "2");
    }

    #[tokio::test]
    async fn malformed_json_is_rejected() {
        let inbound = inbound(&[("content-type", "application/json")]);
        let mut headers = HeaderMap::new();
        let result = outbound_body(&Method::POST, &inbound, Body::from("{oops"), &mut headers).await;
        assert!(matches!(result, Err(ApiError::MalformedBody(_))));
    }

    #[tokio::test]
    async fn multipart_body_is_streamed_with_original_length() {
        let inbound = inbound(&[
            ("content-type", "multipart/form-data; boundary=xyz"),
            ("content-length", "42"),
        ]);
        let mut headers = HeaderMap::new();
        let body = outbound_body(&Method::POST, &inbound, Body::from("x"), &mut headers)
            .await
            .unwrap();

        assert!(matches!(body, OutboundBody::Stream(_)));
        assert_eq!(headers[CONTENT_LENGTH], "42");
    }

    #[tokio::test]
    async fn body_without_length_headers_is_still_streamed() {
        let inbound = inbound(&[("content-type", "application/octet-stream")]);
        let mut headers = HeaderMap::new();
        let body = outbound_body(&Method::POST, &inbound, Body::from("raw"), &mut headers)
            .await
            .unwrap();

        assert!(matches!(body, OutboundBody::Stream(_)));
        assert!(headers.get(CONTENT_LENGTH).is_none());
    }

    #[tokio::test]
    async fn json_body_over_limit_is_too_large() {
        let inbound = inbound(&[("content-type", "application/json")]);
        let mut headers = HeaderMap::new();
        let limited = Body::new(Limited::new(Body::from(r#"{"text":"far too long"}"#), 8));
        let result = outbound_body(&Method::POST, &inbound, limited, &mut headers).await;
        assert!(matches!(result, Err(ApiError::PayloadTooLarge)));
    }

    #[test]
    fn declared_length_parsing() {
        assert_eq!(declared_length(&inbound(&[("content-length", "42")])), Some(42));
        assert_eq!(declared_length(&inbound(&[("content-length", "nope")])), None);
        assert_eq!(declared_length(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn bodyless_requests_send_no_body() {
        let mut headers = HeaderMap::new();
        let body = outbound_body(&Method::GET, &HeaderMap::new(), Body::empty(), &mut headers)
            .await
            .unwrap();
        assert!(matches!(body, OutboundBody::Empty));
        assert!(headers.get(CONTENT_LENGTH).is_none());
    }
}
