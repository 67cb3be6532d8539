//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create Axum Router with the dispatch handler as fallback
//! - Wire up middleware (tracing, timeout, request ID)
//! - Dispatch requests through the routing table
//! - Hand matched requests to the forwarding engine
//!
//! # Design Decisions
//! - One router per listener; the listener's scheme is part of its state
//! - Closed world: unmatched requests get 502 and are never forwarded

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::TimeoutConfig;
use crate::http::forward::ForwardingEngine;
use crate::http::request::{ProxyRequest, UuidRequestId, X_REQUEST_ID};
use crate::http::rewrite::rewrite;
use crate::observability::metrics::{self, Outcome};
use crate::routing::{RoutingTable, Scheme};

/// Application state injected into the dispatch handler.
#[derive(Clone)]
pub struct AppState {
    pub table: Arc<RoutingTable>,
    pub forwarder: Arc<dyn ForwardingEngine>,
    /// Scheme of the listener this router serves.
    pub scheme: Scheme,
}

impl AppState {
    pub fn new(table: Arc<RoutingTable>, forwarder: Arc<dyn ForwardingEngine>, scheme: Scheme) -> Self {
        Self {
            table,
            forwarder,
            scheme,
        }
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(state: AppState, timeouts: &TimeoutConfig) -> Router {
    // Slightly above the forwarder's own limit so its 504 wins.
    let request_timeout = Duration::from_secs(timeouts.write_secs) + Duration::from_secs(1);

    Router::new()
        .fallback(dispatch)
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
        .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
        .layer(TraceLayer::new_for_http())
}

/// Main proxy handler.
/// Looks up the route, rewrites, and forwards; 502 when nothing matches.
pub async fn dispatch(
    State(state): State<AppState>,
    ConnectInfo(client_addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let inbound = ProxyRequest::from_request(&request, state.scheme, client_addr);

    let Some(route) = state.table.lookup(&inbound.host, inbound.scheme) else {
        tracing::warn!(
            request_id = %request_id,
            host = %inbound.host,
            scheme = %inbound.scheme,
            client = %client_addr,
            "No route matched"
        );
        metrics::record_request(state.scheme, Outcome::Unrouted, StatusCode::BAD_GATEWAY, start_time);
        return StatusCode::BAD_GATEWAY.into_response();
    };

    let rewritten = rewrite(&inbound, route);
    tracing::debug!(
        request_id = %request_id,
        host = %inbound.host,
        backend = %rewritten.authority,
        path = %rewritten.path_and_query,
        "Proxying request"
    );

    let outbound = match rewritten.into_outbound(request) {
        Ok(outbound) => outbound,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to build backend request");
            metrics::record_request(state.scheme, Outcome::Rejected, StatusCode::BAD_GATEWAY, start_time);
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    let response = state.forwarder.forward(outbound).await;
    metrics::record_request(state.scheme, Outcome::Forwarded, response.status(), start_time);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::{HeaderMap, Uri};
    use std::sync::Mutex;
    use tower::ServiceExt;

    use crate::config::MappingConfig;

    /// Records what it was asked to forward and answers with a fixed status.
    struct RecordingForwarder {
        status: StatusCode,
        seen: Mutex<Vec<(Uri, HeaderMap)>>,
    }

    impl RecordingForwarder {
        fn new(status: StatusCode) -> Arc<Self> {
            Arc::new(Self {
                status,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ForwardingEngine for RecordingForwarder {
        async fn forward(&self, request: Request<Body>) -> Response {
            self.seen
                .lock()
                .unwrap()
                .push((request.uri().clone(), request.headers().clone()));
            (self.status, "from backend").into_response()
        }
    }

    fn router(forwarder: Arc<RecordingForwarder>, scheme: Scheme) -> Router {
        let table = RoutingTable::from_mappings(&[
            MappingConfig::with_scheme("a.test", Scheme::Http, 9001),
            MappingConfig::with_tls("secure.test", true, 9002),
        ])
        .unwrap();
        build_router(
            AppState::new(Arc::new(table), forwarder, scheme),
            &TimeoutConfig::default(),
        )
    }

    fn request(host: &str) -> Request<Body> {
        let mut request = Request::builder()
            .uri("/hello?x=1")
            .header("host", host)
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo::<SocketAddr>("203.0.113.7:50000".parse().unwrap()));
        request
    }

    #[tokio::test]
    async fn matched_request_is_forwarded_to_localhost() {
        let forwarder = RecordingForwarder::new(StatusCode::OK);
        let response = router(forwarder.clone(), Scheme::Http)
            .oneshot(request("a.test:8080"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));

        let seen = forwarder.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (uri, headers) = &seen[0];
        assert_eq!(uri, "http://localhost:9001/hello?x=1");
        assert_eq!(headers["host"], "localhost:9001");
        assert_eq!(headers["x-forwarded-proto"], "http");
        assert_eq!(headers["x-forwarded-for"], "203.0.113.7");
        assert_eq!(headers["x-forwarded-host"], "a.test:8080");
        assert!(headers.contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn unmatched_request_is_bad_gateway_and_not_forwarded() {
        let forwarder = RecordingForwarder::new(StatusCode::OK);
        let response = router(forwarder.clone(), Scheme::Http)
            .oneshot(request("b.test"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
        assert!(forwarder.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn transport_criterion_depends_on_listener() {
        let forwarder = RecordingForwarder::new(StatusCode::OK);

        let plain = router(forwarder.clone(), Scheme::Http)
            .oneshot(request("secure.test"))
            .await
            .unwrap();
        assert_eq!(plain.status(), StatusCode::BAD_GATEWAY);

        let tls = router(forwarder.clone(), Scheme::Https)
            .oneshot(request("secure.test"))
            .await
            .unwrap();
        assert_eq!(tls.status(), StatusCode::OK);

        let seen = forwarder.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "http://localhost:9002/hello?x=1");
        assert_eq!(seen[0].1["x-forwarded-proto"], "https");
    }

    #[tokio::test]
    async fn backend_status_is_passed_through() {
        let forwarder = RecordingForwarder::new(StatusCode::SERVICE_UNAVAILABLE);
        let response = router(forwarder, Scheme::Http)
            .oneshot(request("a.test"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"from backend");
    }
}
