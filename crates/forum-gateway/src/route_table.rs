//! Path-prefix routing to upstream services.
//!
//! The table is built once at startup and never mutated. Entries are kept
//! ordered by descending prefix length so that the first match is the most
//! specific one.

use std::fmt;

use axum::http::Method;

use crate::config::ServiceUrls;

/// Prefix served by the auth service. Requests under it are never authenticated.
pub const AUTH_PREFIX: &str = "/auth";

/// Whether requests on a route need a bearer credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// Authentication is required unless a bypass rule matches.
    Protected,
    /// Authentication is never performed.
    Public,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// One or more ASCII digits.
    Numeric,
}

/// A path pattern made of literal segments and `:id` numeric placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parse a pattern such as `/messages/:id`.
    #[must_use]
    pub fn parse(pattern: &str) -> Self {
        let segments = split_segments(pattern)
            .map(|s| {
                if s == ":id" {
                    Segment::Numeric
                } else {
                    Segment::Literal(s.to_string())
                }
            })
            .collect();
        Self { segments }
    }

    /// Check whether `path` matches this pattern segment for segment.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        let mut segments = split_segments(path);
        for expected in &self.segments {
            let Some(actual) = segments.next() else {
                return false;
            };
            let ok = match expected {
                Segment::Literal(literal) => literal == actual,
                Segment::Numeric => {
                    !actual.is_empty() && actual.bytes().all(|b| b.is_ascii_digit())
                }
            };
            if !ok {
                return false;
            }
        }
        segments.next().is_none()
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => write!(f, "/{s}")?,
                Segment::Numeric => f.write_str("/:id")?,
            }
        }
        Ok(())
    }
}

/// Splits a path into segments, ignoring the leading slash and a single trailing slash.
fn split_segments(path: &str) -> std::str::Split<'_, char> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    trimmed.split('/')
}

/// An explicit exemption from the authentication requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BypassRule {
    /// The HTTP method the rule applies to.
    pub method: Method,
    /// The path the rule applies to.
    pub pattern: PathPattern,
}

impl BypassRule {
    /// Create a rule for `method` on paths matching `pattern`.
    #[must_use]
    pub fn new(method: Method, pattern: &str) -> Self {
        Self {
            method,
            pattern: PathPattern::parse(pattern),
        }
    }

    /// Check whether the rule exempts this request.
    #[must_use]
    pub fn matches(&self, method: &Method, path: &str) -> bool {
        &self.method == method && self.pattern.matches(path)
    }
}

impl fmt::Display for BypassRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.pattern)
    }
}

/// A mounted prefix and the upstream that serves it.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    prefix: String,
    upstream: String,
    kind: RouteKind,
    bypass: Vec<BypassRule>,
}

impl RouteEntry {
    /// Create a protected route. Trailing slashes on `upstream` are dropped.
    #[must_use]
    pub fn new(prefix: impl Into<String>, upstream: impl AsRef<str>) -> Self {
        Self {
            prefix: prefix.into(),
            upstream: upstream.as_ref().trim_end_matches('/').to_string(),
            kind: RouteKind::Protected,
            bypass: Vec::new(),
        }
    }

    /// Create a route whose requests are never authenticated.
    #[must_use]
    pub fn public(prefix: impl Into<String>, upstream: impl AsRef<str>) -> Self {
        Self {
            kind: RouteKind::Public,
            ..Self::new(prefix, upstream)
        }
    }

    /// Add a bypass rule to this route.
    #[must_use]
    pub fn with_bypass(mut self, method: Method, pattern: &str) -> Self {
        self.bypass.push(BypassRule::new(method, pattern));
        self
    }

    /// The mounted path prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The upstream base URL, without a trailing slash.
    #[must_use]
    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    /// Whether the route is protected or public.
    #[must_use]
    pub const fn kind(&self) -> RouteKind {
        self.kind
    }

    /// The bypass rules attached to this route.
    #[must_use]
    pub fn bypass_rules(&self) -> &[BypassRule] {
        &self.bypass
    }

    /// Check whether `path` falls under this route's prefix on a segment boundary.
    #[must_use]
    pub fn matches_path(&self, path: &str) -> bool {
        path.strip_prefix(self.prefix.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }

    /// Check whether a bypass rule exempts this request from authentication.
    #[must_use]
    pub fn is_bypassed(&self, method: &Method, path: &str) -> bool {
        self.bypass.iter().any(|rule| rule.matches(method, path))
    }

    /// Check whether this request must carry a valid bearer credential.
    #[must_use]
    pub fn requires_auth(&self, method: &Method, path: &str) -> bool {
        self.kind == RouteKind::Protected && !self.is_bypassed(method, path)
    }

    /// Build the upstream URL for `path`, which is passed through unmodified.
    #[must_use]
    pub fn upstream_url(&self, path: &str, query: Option<&str>) -> String {
        match query {
            Some(query) => format!("{}{path}?{query}", self.upstream),
            None => format!("{}{path}", self.upstream),
        }
    }
}

/// Immutable, ordered list of mounted routes. First match wins.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    /// Build a table from explicit entries.
    #[must_use]
    pub fn new(mut entries: Vec<RouteEntry>) -> Self {
        entries.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        Self { entries }
    }

    /// Build the forum's route table from the configured service URLs.
    ///
    /// Prefixes without an upstream are logged and left unmounted.
    #[must_use]
    pub fn from_services(services: &ServiceUrls) -> Self {
        let mounts = [
            ("/users", services.user.as_deref()),
            ("/admin", services.user.as_deref()),
            ("/posts", services.post.as_deref()),
            ("/replies", services.reply.as_deref()),
            ("/history", services.history.as_deref()),
            ("/messages", services.message.as_deref()),
            (AUTH_PREFIX, services.auth.as_deref()),
            ("/email", services.email.as_deref()),
            ("/files", services.file.as_deref()),
        ];

        let mut entries = Vec::with_capacity(mounts.len());
        for (prefix, upstream) in mounts {
            let Some(upstream) = upstream else {
                tracing::warn!(prefix, "No upstream configured, route not mounted");
                continue;
            };

            let entry = match prefix {
                AUTH_PREFIX => RouteEntry::public(prefix, upstream),
                "/users" => {
                    RouteEntry::new(prefix, upstream).with_bypass(Method::POST, "/users/register")
                }
                "/messages" => RouteEntry::new(prefix, upstream)
                    .with_bypass(Method::POST, "/messages")
                    .with_bypass(Method::PUT, "/messages/:id"),
                _ => RouteEntry::new(prefix, upstream),
            };

            tracing::info!(
                prefix,
                upstream = %entry.upstream(),
                kind = ?entry.kind(),
                bypass = ?entry.bypass_rules().iter().map(ToString::to_string).collect::<Vec<_>>(),
                "Mounted route"
            );
            entries.push(entry);
        }

        Self::new(entries)
    }

    /// Find the most specific route serving `path`.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<&RouteEntry> {
        self.entries.iter().find(|entry| entry.matches_path(path))
    }

    /// Number of mounted routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no route is mounted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
