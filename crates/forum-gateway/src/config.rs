//! Gateway configuration types.
//!
//! Configuration is read once at startup from environment variables.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use forum_auth::AuthConfig;

/// Upstream base URLs, one per downstream service.
///
/// A service left unset is not mounted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceUrls {
    /// User service, serving `/users` and `/admin`.
    pub user: Option<String>,
    /// Post service, serving `/posts`.
    pub post: Option<String>,
    /// Reply service, serving `/replies`.
    pub reply: Option<String>,
    /// History service, serving `/history`.
    pub history: Option<String>,
    /// Message service, serving `/messages`.
    pub message: Option<String>,
    /// Auth service, serving `/auth`.
    pub auth: Option<String>,
    /// Email service, serving `/email`.
    pub email: Option<String>,
    /// File service, serving `/files`.
    pub file: Option<String>,
}

impl ServiceUrls {
    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Self {
        Self {
            user: non_empty(lookup, "USER_SERVICE_URL"),
            post: non_empty(lookup, "POST_SERVICE_URL"),
            reply: non_empty(lookup, "REPLY_SERVICE_URL"),
            history: non_empty(lookup, "HISTORY_SERVICE_URL"),
            message: non_empty(lookup, "MESSAGE_SERVICE_URL"),
            auth: non_empty(lookup, "AUTH_SERVICE_URL"),
            email: non_empty(lookup, "EMAIL_SERVICE_URL"),
            file: non_empty(lookup, "FILE_SERVICE_URL"),
        }
    }
}

/// Configuration for the gateway service.
#[derive(Clone)]
pub struct GatewayConfig {
    /// Listen address (e.g., "0.0.0.0:5009").
    pub listen_addr: String,

    /// Allowed CORS origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Per-call upstream timeout in seconds.
    pub upstream_timeout_seconds: u64,

    /// Upstream connect timeout in seconds.
    pub upstream_connect_timeout_seconds: u64,

    /// Shared token-verification secret.
    pub jwt_secret: String,

    /// Token signing algorithm identifier.
    pub jwt_algorithm: String,

    /// Upstream base URLs.
    pub services: ServiceUrls,
}

impl GatewayConfig {
    const fn default_port() -> u16 {
        5009
    }

    const fn default_max_body() -> usize {
        10 * 1024 * 1024 // 10 MB
    }

    const fn default_upstream_timeout() -> u64 {
        30
    }

    const fn default_connect_timeout() -> u64 {
        5
    }

    fn default_algorithm() -> String {
        "HS256".to_string()
    }

    /// Load the configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load the configuration through an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let listen_addr = non_empty(&lookup, "LISTEN_ADDR").unwrap_or_else(|| {
            let port = parse_or(&lookup, "PORT", Self::default_port());
            format!("0.0.0.0:{port}")
        });

        let cors_origins = non_empty(&lookup, "CORS_ORIGINS").map_or_else(
            || vec!["*".to_string()],
            |origins| {
                origins
                    .split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(String::from)
                    .collect()
            },
        );

        Self {
            listen_addr,
            cors_origins,
            max_body_bytes: parse_or(&lookup, "MAX_BODY_BYTES", Self::default_max_body()),
            upstream_timeout_seconds: parse_or(
                &lookup,
                "UPSTREAM_TIMEOUT_SECS",
                Self::default_upstream_timeout(),
            ),
            upstream_connect_timeout_seconds: parse_or(
                &lookup,
                "UPSTREAM_CONNECT_TIMEOUT_SECS",
                Self::default_connect_timeout(),
            ),
            jwt_secret: lookup("JWT_SECRET").unwrap_or_default(),
            jwt_algorithm: non_empty(&lookup, "JWT_ALGORITHM")
                .unwrap_or_else(Self::default_algorithm),
            services: ServiceUrls::from_lookup(&lookup),
        }
    }

    /// Build the token verification settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret is missing or the algorithm is not a
    /// shared-secret algorithm.
    pub fn auth_config(&self) -> forum_auth::Result<AuthConfig> {
        AuthConfig::new(self.jwt_secret.clone(), &self.jwt_algorithm)
    }

    /// Get the upstream call timeout as a `Duration`.
    #[must_use]
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_seconds)
    }

    /// Get the upstream connect timeout as a `Duration`.
    #[must_use]
    pub fn upstream_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_connect_timeout_seconds)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: format!("0.0.0.0:{}", Self::default_port()),
            cors_origins: vec!["*".to_string()],
            max_body_bytes: Self::default_max_body(),
            upstream_timeout_seconds: Self::default_upstream_timeout(),
            upstream_connect_timeout_seconds: Self::default_connect_timeout(),
            jwt_secret: String::new(),
            jwt_algorithm: Self::default_algorithm(),
            services: ServiceUrls::default(),
        }
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("listen_addr", &self.listen_addr)
            .field("cors_origins", &self.cors_origins)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("upstream_timeout_seconds", &self.upstream_timeout_seconds)
            .field(
                "upstream_connect_timeout_seconds",
                &self.upstream_connect_timeout_seconds,
            )
            .field("jwt_secret", &"<redacted>")
            .field("jwt_algorithm", &self.jwt_algorithm)
            .field("services", &self.services)
            .finish()
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + fmt::Display,
{
    match non_empty(lookup, key) {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, default = %default, "Invalid value, using default");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:5009");
        assert_eq!(config.cors_origins, vec!["*".to_string()]);
        assert_eq!(config.max_body_bytes, 10 * 1024 * 1024);
        assert_eq!(config.jwt_algorithm, "HS256");
        assert_eq!(config.services, ServiceUrls::default());
    }

    #[test]
    fn timeout_duration() {
        let config = GatewayConfig::default();
        assert_eq!(config.upstream_timeout(), Duration::from_secs(30));
        assert_eq!(config.upstream_connect_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn empty_environment_matches_defaults() {
        let config = GatewayConfig::from_lookup(lookup_from(&[]));
        let defaults = GatewayConfig::default();
        assert_eq!(config.listen_addr, defaults.listen_addr);
        assert_eq!(config.max_body_bytes, defaults.max_body_bytes);
        assert_eq!(config.services, ServiceUrls::default());
    }

    #[test]
    fn reads_port_and_services() {
        let config = GatewayConfig::from_lookup(lookup_from(&[
            ("PORT", "8000"),
            ("USER_SERVICE_URL", "http://users:5001/"),
            ("MESSAGE_SERVICE_URL", "http://messages:5006"),
            ("AUTH_SERVICE_URL", "   "),
            ("JWT_SECRET", "s3cret"),
            ("JWT_ALGORITHM", "HS512"),
        ]));

        assert_eq!(config.listen_addr, "0.0.0.0:8000");
        assert_eq!(config.services.user.as_deref(), Some("http://users:5001/"));
        assert_eq!(
            config.services.message.as_deref(),
            Some("http://messages:5006")
        );
        assert_eq!(config.services.auth, None);
        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(config.jwt_algorithm, "HS512");
    }

    #[test]
    fn listen_addr_overrides_port() {
        let config = GatewayConfig::from_lookup(lookup_from(&[
            ("PORT", "8000"),
            ("LISTEN_ADDR", "127.0.0.1:9000"),
        ]));
        assert_eq!(config.listen_addr, "127.0.0.1:9000");
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let config = GatewayConfig::from_lookup(lookup_from(&[
            ("PORT", "not-a-port"),
            ("UPSTREAM_TIMEOUT_SECS", "-1"),
        ]));
        assert_eq!(config.listen_addr, "0.0.0.0:5009");
        assert_eq!(config.upstream_timeout_seconds, 30);
    }

    #[test]
    fn cors_origins_are_split() {
        let config = GatewayConfig::from_lookup(lookup_from(&[(
            "CORS_ORIGINS",
            "http://localhost:5173, https://forum.example.com,",
        )]));
        assert_eq!(
            config.cors_origins,
            vec![
                "http://localhost:5173".to_string(),
                "https://forum.example.com".to_string()
            ]
        );
    }

    #[test]
    fn auth_config_requires_secret() {
        let config = GatewayConfig::default();
        assert!(config.auth_config().is_err());

        let config = GatewayConfig {
            jwt_secret: "secret".to_string(),
            ..GatewayConfig::default()
        };
        assert!(config.auth_config().is_ok());
    }

    #[test]
    fn debug_redacts_secret() {
        let config = GatewayConfig {
            jwt_secret: "do-not-print".to_string(),
            ..GatewayConfig::default()
        };
        assert!(!format!("{config:?}").contains("do-not-print"));
    }
}
