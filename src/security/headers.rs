//! Header manipulation for forwarded requests.
//!
//! # Responsibilities
//! - Build X-Forwarded-For, X-Forwarded-Proto, X-Forwarded-Host
//! - Strip hop-by-hop headers in both directions
//!
//! # Design Decisions
//! - Preserve original client IP in X-Forwarded-For, appended to any
//!   chain the client already sent
//! - Inbound X-Forwarded-* are replaced, never merged header-by-header

use std::net::IpAddr;

use axum::http::header::{HeaderMap, HeaderName, HeaderValue, InvalidHeaderValue, CONNECTION};

use crate::routing::Scheme;

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");

/// Headers that describe a single connection and must not be forwarded.
pub const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Forwarded-identity header values for one outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedHeaders {
    /// Full X-Forwarded-For chain, client IP last.
    pub for_chain: String,
    pub proto: Scheme,
    /// Authority the client asked for, if it sent one.
    pub host: Option<String>,
}

impl ForwardedHeaders {
    pub fn new(prior_chain: Option<&str>, client_ip: IpAddr, proto: Scheme, host: Option<&str>) -> Self {
        Self {
            for_chain: forwarded_for_chain(prior_chain, client_ip),
            proto,
            host: host.filter(|h| !h.is_empty()).map(str::to_owned),
        }
    }

    /// Replace any X-Forwarded-* in `headers` with these values.
    pub fn apply(&self, headers: &mut HeaderMap) -> Result<(), InvalidHeaderValue> {
        headers.remove(&X_FORWARDED_FOR);
        headers.remove(&X_FORWARDED_PROTO);
        headers.remove(&X_FORWARDED_HOST);

        headers.insert(X_FORWARDED_FOR, HeaderValue::from_str(&self.for_chain)?);
        headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static(self.proto.as_str()));
        if let Some(host) = &self.host {
            headers.insert(X_FORWARDED_HOST, HeaderValue::from_str(host)?);
        }
        Ok(())
    }
}

/// Append `client_ip` to an existing X-Forwarded-For chain.
pub fn forwarded_for_chain(prior_chain: Option<&str>, client_ip: IpAddr) -> String {
    match prior_chain.map(str::trim).filter(|p| !p.is_empty()) {
        Some(prior) => format!("{prior}, {client_ip}"),
        None => client_ip.to_string(),
    }
}

/// Join every X-Forwarded-For line the client sent.
pub fn prior_forwarded_for(headers: &HeaderMap) -> Option<String> {
    let lines: Vec<&str> = headers
        .get_all(&X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join(", "))
    }
}

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_appends_client() {
        let ip: IpAddr = "203.0.113.7".parse().unwrap();
        assert_eq!(forwarded_for_chain(None, ip), "203.0.113.7");
        assert_eq!(forwarded_for_chain(Some("  "), ip), "203.0.113.7");
        assert_eq!(
            forwarded_for_chain(Some("198.51.100.1, 10.0.0.1"), ip),
            "198.51.100.1, 10.0.0.1, 203.0.113.7"
        );
    }

    #[test]
    fn prior_chain_joins_lines() {
        let mut headers = HeaderMap::new();
        assert_eq!(prior_forwarded_for(&headers), None);

        headers.append(X_FORWARDED_FOR, HeaderValue::from_static("198.51.100.1"));
        headers.append(X_FORWARDED_FOR, HeaderValue::from_static("10.0.0.1"));
        assert_eq!(prior_forwarded_for(&headers).as_deref(), Some("198.51.100.1, 10.0.0.1"));
    }

    #[test]
    fn apply_replaces_client_supplied_values() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("https"));
        headers.insert(X_FORWARDED_HOST, HeaderValue::from_static("spoofed.test"));

        let forwarded = ForwardedHeaders::new(None, "127.0.0.1".parse().unwrap(), Scheme::Http, None);
        forwarded.apply(&mut headers).unwrap();

        assert_eq!(headers[&X_FORWARDED_FOR], "127.0.0.1");
        assert_eq!(headers[&X_FORWARDED_PROTO], "http");
        assert!(headers.get(&X_FORWARDED_HOST).is_none());
    }

    #[test]
    fn strips_hop_by_hop_and_connection_listed() {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive, x-session-hint"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-session-hint", HeaderValue::from_static("1"));
        headers.insert("upgrade", HeaderValue::from_static("websocket"));
        headers.insert("accept", HeaderValue::from_static("*/*"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert_eq!(headers["accept"], "*/*");
    }
}
