//! Authentication error types.

use thiserror::Error;

/// A result type using `AuthError`.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur during authentication.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The JWT has expired.
    #[error("token expired")]
    TokenExpired,

    /// The JWT signature is invalid.
    #[error("invalid signature")]
    InvalidSignature,

    /// A required claim is missing from the token.
    #[error("missing required claim: {0}")]
    MissingClaim(String),

    /// The token format is invalid.
    #[error("invalid token format: {0}")]
    InvalidToken(String),

    /// The configured signing algorithm cannot be used with a shared secret.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// No shared secret was configured.
    #[error("token secret is not configured")]
    MissingSecret,
}

impl AuthError {
    /// Returns `true` if this error comes from the gateway's own setup rather
    /// than from the presented credential.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::UnsupportedAlgorithm(_) | Self::MissingSecret)
    }
}
