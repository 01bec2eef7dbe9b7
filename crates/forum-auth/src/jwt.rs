//! JWT validation and claims extraction.
//!
//! This module provides the core JWT validation logic, including signature
//! verification and claims validation.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;

use crate::error::{AuthError, Result};
use crate::AuthConfig;

/// Identity claims extracted from a verified token.
///
/// Lives for the duration of a single request and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaims {
    /// The user ID from the `user_id` claim.
    pub user_id: UserIdClaim,
    /// The user's role (e.g. `user`, `admin`, `superadmin`).
    pub role: String,
    /// Whether the user's email address is verified.
    pub verified: bool,
    /// Whether the account is active.
    pub active: bool,
    /// When the token expires.
    pub expires_at: DateTime<Utc>,
}

/// A user ID claim, issued either as a JSON number or a JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum UserIdClaim {
    /// Numeric database ID.
    Numeric(i64),
    /// Opaque textual ID.
    Text(String),
}

impl fmt::Display for UserIdClaim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

/// Trait for validating JWTs.
#[async_trait]
pub trait JwtValidator: Send + Sync {
    /// Validate a JWT and extract claims.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is invalid, expired, or cannot be validated.
    async fn validate(&self, token: &str) -> Result<IdentityClaims>;
}

/// Raw claims as issued by the auth service.
#[derive(Debug, Deserialize)]
struct RawClaims {
    user_id: Option<UserIdClaim>,
    role: Option<String>,
    /// The issuer may emit `null` for unset flags.
    #[serde(default)]
    verified: Option<bool>,
    #[serde(default)]
    active: Option<bool>,
    /// Expiration timestamp (validated by jsonwebtoken)
    exp: u64,
}

/// Shared-secret JWT validator.
///
/// Verifies HMAC signatures with the secret the auth service signs with and
/// rejects expired tokens.
pub struct SecretValidator {
    key: DecodingKey,
    validation: Validation,
}

impl SecretValidator {
    /// Create a new validator from the given configuration.
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(config.algorithm);
        validation.leeway = config.leeway_seconds;
        validation.validate_exp = true;
        validation.validate_aud = false;

        Self {
            key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl JwtValidator for SecretValidator {
    async fn validate(&self, token: &str) -> Result<IdentityClaims> {
        let token_data =
            decode::<RawClaims>(token, &self.key, &self.validation).map_err(|e| {
                tracing::debug!(kind = ?e.kind(), "Token rejected");
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        AuthError::InvalidSignature
                    }
                    _ => AuthError::InvalidToken(e.to_string()),
                }
            })?;

        let claims = token_data.claims;

        let Some(user_id) = claims.user_id else {
            tracing::debug!("Token has no user_id claim");
            return Err(AuthError::MissingClaim("user_id".to_string()));
        };
        let role = claims
            .role
            .ok_or_else(|| AuthError::MissingClaim("role".to_string()))?;

        let exp_secs = i64::try_from(claims.exp).unwrap_or(i64::MAX);
        let expires_at = DateTime::from_timestamp(exp_secs, 0)
            .ok_or_else(|| AuthError::InvalidToken("invalid exp timestamp".to_string()))?;

        Ok(IdentityClaims {
            user_id,
            role,
            verified: claims.verified.unwrap_or(false),
            active: claims.active.unwrap_or(false),
            expires_at,
        })
    }
}

/// A mock JWT validator for testing.
///
/// This validator accepts any token in the format
/// `test-token:<user_id>:<role>[:verified]` and builds claims from it.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct MockJwtValidator;

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl JwtValidator for MockJwtValidator {
    async fn validate(&self, token: &str) -> Result<IdentityClaims> {
        let rest = token.strip_prefix("test-token:").ok_or_else(|| {
            AuthError::InvalidToken("expected test-token:<user_id>:<role>[:verified]".to_string())
        })?;

        let parts: Vec<&str> = rest.split(':').collect();
        let (user_id, role, verified) = match parts.as_slice() {
            [user_id, role] => (*user_id, *role, false),
            [user_id, role, "verified"] => (*user_id, *role, true),
            _ => {
                return Err(AuthError::InvalidToken(
                    "expected test-token:<user_id>:<role>[:verified]".to_string(),
                ))
            }
        };

        if user_id.is_empty() {
            return Err(AuthError::MissingClaim("user_id".to_string()));
        }

        let user_id = user_id
            .parse::<i64>()
            .map_or_else(|_| UserIdClaim::Text(user_id.to_string()), UserIdClaim::Numeric);

        Ok(IdentityClaims {
            user_id,
            role: role.to_string(),
            verified,
            active: true,
            expires_at: Utc::now() + chrono::Duration::hours(1),
        })
    }
}
