//! Bearer token verification for the forum gateway.
//!
//! The forum's auth service signs access tokens with a shared secret. This
//! crate verifies those tokens and turns them into [`IdentityClaims`]:
//!
//! - HMAC (`HS256`, `HS384`, `HS512`) signature verification
//! - Expiry validation
//! - Claims extraction (`user_id`, `role`, `verified`, `active`)
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐
//! │   Gateway        │────▶│   JwtValidator   │
//! │   (auth filter)  │     │   (trait)        │
//! └──────────────────┘     └────────┬─────────┘
//!                                   │
//!                          ┌────────▼─────────┐
//!                          │ SecretValidator  │
//!                          │ (shared secret)  │
//!                          └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use forum_auth::{AuthConfig, JwtValidator, SecretValidator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthConfig::new("YourSuperSecretKey", "HS256")?;
//! let validator = SecretValidator::new(&config);
//!
//! // In a request handler:
//! let token = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...";
//! let claims = validator.validate(token).await?;
//!
//! println!("User ID: {}", claims.user_id);
//! println!("Role: {}", claims.role);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod jwt;

use std::fmt;
use std::str::FromStr;

use jsonwebtoken::Algorithm;

pub use error::{AuthError, Result};
pub use jwt::{IdentityClaims, JwtValidator, SecretValidator, UserIdClaim};

#[cfg(any(test, feature = "test-utils"))]
pub use jwt::MockJwtValidator;

/// Configuration for verifying tokens issued by the forum auth service.
#[derive(Clone)]
pub struct AuthConfig {
    /// Shared signing secret.
    pub secret: String,
    /// Expected signing algorithm.
    pub algorithm: Algorithm,
    /// Clock skew tolerated when checking `exp`, in seconds.
    pub leeway_seconds: u64,
}

impl AuthConfig {
    /// Build a configuration from a secret and an algorithm name such as `"HS256"`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingSecret`] if the secret is empty, or
    /// [`AuthError::UnsupportedAlgorithm`] if the algorithm is unknown or is
    /// not an HMAC algorithm.
    pub fn new(secret: impl Into<String>, algorithm: &str) -> Result<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(AuthError::MissingSecret);
        }

        let algorithm = Algorithm::from_str(algorithm.trim())
            .map_err(|_| AuthError::UnsupportedAlgorithm(algorithm.to_string()))?;

        if !matches!(
            algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(AuthError::UnsupportedAlgorithm(format!("{algorithm:?}")));
        }

        Ok(Self {
            secret,
            algorithm,
            leeway_seconds: 0,
        })
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .field("leeway_seconds", &self.leeway_seconds)
            .finish()
    }
}
