//! Route matching logic.
//!
//! # Responsibilities
//! - Match host (exact match, case-insensitive)
//! - Match transport (explicit scheme, or TLS yes/no)
//! - Combine conditions with AND semantics
//!
//! # Design Decisions
//! - Host matching is case-insensitive (RFC 9110)
//! - Both config shapes (`scheme` string, `use_tls` flag) compile to one
//!   `TransportMatcher`, so the table is written once
//! - No regex, no wildcards

use std::fmt;

use serde::{Deserialize, Serialize};

/// Inbound scheme. Fixed per listener: the TLS listener serves `Https`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    /// Whether requests with this scheme arrived over TLS.
    pub fn is_tls(self) -> bool {
        matches!(self, Scheme::Https)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The routing-relevant view of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestKey<'a> {
    /// Host with port stripped.
    pub host: &'a str,
    pub scheme: Scheme,
}

impl<'a> RequestKey<'a> {
    pub fn new(host: &'a str, scheme: Scheme) -> Self {
        Self { host, scheme }
    }

    pub fn is_tls(&self) -> bool {
        self.scheme.is_tls()
    }
}

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, key: &RequestKey<'_>) -> bool;
}

/// Matches the request host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostMatcher {
    expected_host: String,
}

impl HostMatcher {
    /// Create a new host matcher.
    /// The host is normalized to lowercase for case-insensitive matching.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            expected_host: host.into().trim().to_ascii_lowercase(),
        }
    }

    pub fn host(&self) -> &str {
        &self.expected_host
    }
}

impl Matcher for HostMatcher {
    fn matches(&self, key: &RequestKey<'_>) -> bool {
        key.host.eq_ignore_ascii_case(&self.expected_host)
    }
}

/// Matches how the request reached the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMatcher {
    /// `"scheme": "http" | "https"` in the config.
    Scheme(Scheme),
    /// `"use_tls": bool` in the config.
    Tls(bool),
}

impl Matcher for TransportMatcher {
    fn matches(&self, key: &RequestKey<'_>) -> bool {
        match *self {
            TransportMatcher::Scheme(scheme) => key.scheme == scheme,
            TransportMatcher::Tls(tls) => key.is_tls() == tls,
        }
    }
}

impl fmt::Display for TransportMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportMatcher::Scheme(scheme) => write!(f, "scheme={scheme}"),
            TransportMatcher::Tls(tls) => write!(f, "tls={tls}"),
        }
    }
}
