//! Outbound request rewriting.
//!
//! A matched request keeps its method, path, query and body. Only the
//! authority changes (always `localhost:<port>`) and the forwarded-identity
//! headers are set so the backend can see the original client and scheme.
//! The hop to the backend is plaintext over loopback even when the client
//! used TLS.

use axum::body::Body;
use axum::http::header::{HeaderValue, InvalidHeaderValue, HOST};
use axum::http::uri::{Authority, PathAndQuery, Scheme as UriScheme};
use axum::http::{Request, Uri, Version};
use thiserror::Error;

use crate::http::request::ProxyRequest;
use crate::routing::{RouteEntry, Scheme};
use crate::security::headers::{strip_hop_by_hop, ForwardedHeaders};

/// Backends are always reached on the loopback interface.
pub const BACKEND_HOST: &str = "localhost";

/// Error assembling the outbound request.
#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("invalid backend URI: {0}")]
    Uri(#[from] axum::http::Error),

    #[error("invalid forwarded header: {0}")]
    Header(#[from] InvalidHeaderValue),
}

/// Shape of the request the backend will receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenRequest {
    /// `localhost:<backend_port>`.
    pub authority: String,
    /// Inbound scheme. Advisory only; reported via X-Forwarded-Proto.
    pub scheme: Scheme,
    pub path_and_query: String,
    pub forwarded: ForwardedHeaders,
}

/// Build the outbound request description for a matched route.
pub fn rewrite(original: &ProxyRequest, route: &RouteEntry) -> RewrittenRequest {
    RewrittenRequest {
        authority: format!("{BACKEND_HOST}:{}", route.backend_port()),
        scheme: original.scheme,
        path_and_query: original.path_and_query.clone(),
        forwarded: ForwardedHeaders::new(
            original.forwarded_for.as_deref(),
            original.client_addr.ip(),
            original.scheme,
            original.authority.as_deref(),
        ),
    }
}

impl RewrittenRequest {
    /// URI of the plaintext hop to the backend.
    pub fn backend_uri(&self) -> Result<Uri, axum::http::Error> {
        Uri::builder()
            .scheme(UriScheme::HTTP)
            .authority(Authority::try_from(self.authority.as_str())?)
            .path_and_query(PathAndQuery::try_from(self.path_and_query.as_str())?)
            .build()
    }

    /// Turn the inbound request into the one handed to the forwarding engine.
    ///
    /// Method and body pass through; the body is not buffered.
    pub fn into_outbound(self, inbound: Request<Body>) -> Result<Request<Body>, RewriteError> {
        let uri = self.backend_uri()?;
        let (mut parts, body) = inbound.into_parts();

        strip_hop_by_hop(&mut parts.headers);
        self.forwarded.apply(&mut parts.headers)?;
        parts
            .headers
            .insert(HOST, HeaderValue::from_str(&self.authority)?);

        parts.uri = uri;
        parts.version = Version::HTTP_11;

        Ok(Request::from_parts(parts, body))
    }
}
