//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from the JSON config file.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use serde::{Deserialize, Serialize};

use crate::routing::{Scheme, TransportMatcher};

/// Root configuration for the reverse proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Ordered routing rules, first match wins.
    pub mapping: Vec<MappingConfig>,

    /// Certificate/key pairs served by the TLS listener.
    pub tls_files: Vec<TlsFiles>,

    /// Plaintext listener port.
    pub http_port: Option<u16>,

    /// TLS listener port.
    pub https_port: Option<u16>,

    /// Single-port mode: one plaintext listener, no TLS.
    pub listen_port: Option<u16>,

    /// Address both listeners bind to.
    pub bind_address: IpAddr,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            mapping: Vec::new(),
            tls_files: Vec::new(),
            http_port: None,
            https_port: None,
            listen_port: None,
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            timeouts: TimeoutConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl ProxyConfig {
    /// Work out which listeners to run from the port fields.
    ///
    /// Returns `None` for combinations validation rejects.
    pub fn listener_plan(&self) -> Option<ListenerPlan> {
        let addr = |port: u16| SocketAddr::new(self.bind_address, port);
        match (self.listen_port, self.http_port, self.https_port) {
            (Some(port), None, None) => Some(ListenerPlan::Plain(addr(port))),
            (None, Some(http), Some(https)) => Some(ListenerPlan::Dual {
                http: addr(http),
                https: addr(https),
            }),
            (None, Some(http), None) => Some(ListenerPlan::Plain(addr(http))),
            (None, None, Some(https)) => Some(ListenerPlan::Tls(addr(https))),
            _ => None,
        }
    }
}

/// The set of listeners a configuration asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerPlan {
    /// Plaintext listener only.
    Plain(SocketAddr),
    /// TLS listener only.
    Tls(SocketAddr),
    /// Plaintext and TLS listeners with mutual shutdown.
    Dual { http: SocketAddr, https: SocketAddr },
}

impl ListenerPlan {
    /// Whether this plan runs a TLS listener and therefore needs certificates.
    pub fn needs_tls(&self) -> bool {
        matches!(self, ListenerPlan::Tls(_) | ListenerPlan::Dual { .. })
    }
}

/// One routing rule as written in the config file.
///
/// Exactly one of `scheme` and `use_tls` must be present.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct MappingConfig {
    /// Host to match, without port.
    pub host: String,

    /// Match on the inbound scheme.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<Scheme>,

    /// Match on whether the inbound connection used TLS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_tls: Option<bool>,

    /// Backend port on localhost.
    pub port: u16,
}

impl MappingConfig {
    /// Mapping that matches on an explicit scheme.
    pub fn with_scheme(host: impl Into<String>, scheme: Scheme, port: u16) -> Self {
        Self {
            host: host.into(),
            scheme: Some(scheme),
            use_tls: None,
            port,
        }
    }

    /// Mapping that matches on the inbound TLS state.
    pub fn with_tls(host: impl Into<String>, use_tls: bool, port: u16) -> Self {
        Self {
            host: host.into(),
            scheme: None,
            use_tls: Some(use_tls),
            port,
        }
    }

    /// The match criterion, if exactly one form is configured.
    pub fn transport(&self) -> Option<TransportMatcher> {
        match (self.scheme, self.use_tls) {
            (Some(scheme), None) => Some(TransportMatcher::Scheme(scheme)),
            (None, Some(tls)) => Some(TransportMatcher::Tls(tls)),
            _ => None,
        }
    }
}

/// A certificate chain and its private key, both PEM.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TlsFiles {
    pub cert_file: String,
    pub key_file: String,
}

/// Timeout configuration for listeners and forwarding.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed for a client to send request headers, in seconds.
    pub read_secs: u64,

    /// Time allowed for the backend to produce a response, in seconds.
    pub write_secs: u64,

    /// How long a stopping listener drains in-flight connections, in seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            read_secs: 15,
            write_secs: 15,
            shutdown_grace_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
