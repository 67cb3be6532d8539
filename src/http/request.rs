//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate unique request ID (UUID v4)
//! - Extract routing-relevant information (host, scheme, path)
//! - Capture the client identity needed for X-Forwarded-*
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - `ProxyRequest` is a per-request snapshot; the inbound request itself
//!   is handed on untouched so its body can stream

use std::net::SocketAddr;
use std::str::FromStr;

use axum::http::header::{HeaderName, HeaderValue, HOST};
use axum::http::uri::Authority;
use axum::http::Request;
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::routing::Scheme;
use crate::security::headers::prior_forwarded_for;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Generates a v4 UUID for requests that arrive without an `x-request-id`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// What the proxy knows about one inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRequest {
    /// Lowercase host with port stripped; empty if the client sent none.
    pub host: String,
    /// Authority exactly as the client sent it.
    pub authority: Option<String>,
    /// Scheme of the listener that accepted the request.
    pub scheme: Scheme,
    pub path_and_query: String,
    pub client_addr: SocketAddr,
    /// X-Forwarded-For chain the client already carried.
    pub forwarded_for: Option<String>,
}

impl ProxyRequest {
    pub fn from_request<B>(request: &Request<B>, scheme: Scheme, client_addr: SocketAddr) -> Self {
        // HTTP/2 carries the authority in the URI; HTTP/1.1 in Host.
        let authority = request
            .uri()
            .authority()
            .map(|a| a.as_str().to_owned())
            .or_else(|| {
                request
                    .headers()
                    .get(HOST)
                    .and_then(|h| h.to_str().ok())
                    .map(str::to_owned)
            });

        let host = authority.as_deref().map(normalize_host).unwrap_or_default();

        let path_and_query = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_owned())
            .unwrap_or_else(|| "/".to_string());

        Self {
            host,
            authority,
            scheme,
            path_and_query,
            client_addr,
            forwarded_for: prior_forwarded_for(request.headers()),
        }
    }

    pub fn is_tls(&self) -> bool {
        self.scheme.is_tls()
    }
}

/// Strip the port from an authority and lowercase it.
///
/// IPv6 literals keep their brackets: `[::1]:8080` becomes `[::1]`.
pub fn normalize_host(authority: &str) -> String {
    let authority = authority.trim();
    match Authority::from_str(authority) {
        Ok(parsed) => parsed.host().to_ascii_lowercase(),
        Err(_) => authority.to_ascii_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn client() -> SocketAddr {
        "203.0.113.7:50000".parse().unwrap()
    }

    #[test]
    fn normalizes_hosts() {
        assert_eq!(normalize_host("A.Test:8080"), "a.test");
        assert_eq!(normalize_host("a.test"), "a.test");
        assert_eq!(normalize_host("[::1]:8443"), "[::1]");
        assert_eq!(normalize_host("127.0.0.1:80"), "127.0.0.1");
    }

    #[test]
    fn extracts_from_host_header() {
        let request = Request::builder()
            .uri("/search?q=rust")
            .header(HOST, "A.test:8080")
            .header("x-forwarded-for", "198.51.100.1")
            .body(Body::empty())
            .unwrap();

        let proxy = ProxyRequest::from_request(&request, Scheme::Http, client());
        assert_eq!(proxy.host, "a.test");
        assert_eq!(proxy.authority.as_deref(), Some("A.test:8080"));
        assert_eq!(proxy.path_and_query, "/search?q=rust");
        assert_eq!(proxy.forwarded_for.as_deref(), Some("198.51.100.1"));
        assert!(!proxy.is_tls());
    }

    #[test]
    fn prefers_uri_authority() {
        let request = Request::builder()
            .uri("https://a.test:8443/")
            .header(HOST, "ignored.test")
            .body(Body::empty())
            .unwrap();

        let proxy = ProxyRequest::from_request(&request, Scheme::Https, client());
        assert_eq!(proxy.host, "a.test");
        assert!(proxy.is_tls());
    }

    #[test]
    fn missing_host_is_empty() {
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();

        let proxy = ProxyRequest::from_request(&request, Scheme::Http, client());
        assert_eq!(proxy.host, "");
        assert_eq!(proxy.authority, None);
        assert_eq!(proxy.path_and_query, "/");
    }

    #[test]
    fn request_ids_are_unique() {
        let request = Request::builder().body(Body::empty()).unwrap();
        let mut maker = UuidRequestId;
        let a = maker.make_request_id(&request).unwrap();
        let b = maker.make_request_id(&request).unwrap();
        assert_ne!(a.header_value(), b.header_value());
    }
}
