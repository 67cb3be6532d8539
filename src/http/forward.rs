//! Forwarding engine.
//!
//! # Responsibilities
//! - Send the rewritten request to the backend
//! - Stream the backend response back without buffering
//! - Map transport failures to gateway status codes
//!
//! # Design Decisions
//! - `ForwardingEngine` is the seam the dispatch handler drives; tests
//!   substitute recording engines
//! - Backend timeouts result in 504 Gateway Timeout; once the head has
//!   arrived, a body that stays idle for the same period is cut off
//! - Connect and protocol errors result in 502 Bad Gateway with no body

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use hyper::body::Incoming;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tower_http::timeout::TimeoutBody;

use crate::security::headers::strip_hop_by_hop;

/// Performs the network call for a rewritten request.
#[async_trait]
pub trait ForwardingEngine: Send + Sync {
    /// Forward `request` and return the response for the client.
    ///
    /// Failures are expressed as responses; this never errors.
    async fn forward(&self, request: Request<Body>) -> Response;
}

/// Forwards over a pooled hyper client.
#[derive(Clone)]
pub struct HyperForwarder {
    client: Client<HttpConnector, Body>,
    timeout: Duration,
}

impl HyperForwarder {
    /// `timeout` bounds the wait for the backend's response head, and then
    /// the gap between body frames.
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client, timeout }
    }
}

#[async_trait]
impl ForwardingEngine for HyperForwarder {
    async fn forward(&self, request: Request<Body>) -> Response {
        let target = request.uri().clone();

        match tokio::time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => into_client_response(response, self.timeout),
            Ok(Err(e)) => {
                tracing::error!(backend = %target, error = %e, "Upstream error");
                StatusCode::BAD_GATEWAY.into_response()
            }
            Err(_) => {
                tracing::warn!(backend = %target, timeout = ?self.timeout, "Upstream timed out");
                StatusCode::GATEWAY_TIMEOUT.into_response()
            }
        }
    }
}

/// Pass the backend response through, minus its hop-by-hop headers.
///
/// The body streams; a stall longer than `idle` ends it with an error.
fn into_client_response(response: hyper::Response<Incoming>, idle: Duration) -> Response {
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, Body::new(TimeoutBody::new(idle, body)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn unreachable_backend_is_bad_gateway() {
        // Bind then drop to get a port nothing listens on.
        let port = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap()
            .port();

        let forwarder = HyperForwarder::new(Duration::from_secs(5));
        let request = Request::builder()
            .uri(format!("http://127.0.0.1:{port}/"))
            .body(Body::empty())
            .unwrap();

        let response = forwarder.forward(request).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn silent_backend_is_gateway_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let forwarder = HyperForwarder::new(Duration::from_millis(200));
        let request = Request::builder()
            .uri(format!("http://{addr}/"))
            .body(Body::empty())
            .unwrap();

        let response = forwarder.forward(request).await;
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn passes_backend_status_through() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let _ = socket
                .write_all(b"HTTP/1.1 418 I'm a teapot\r\nContent-Length: 3\r\nKeep-Alive: timeout=5\r\nConnection: close\r\n\r\ntea")
                .await;
            let _ = socket.shutdown().await;
        });

        let forwarder = HyperForwarder::new(Duration::from_secs(5));
        let request = Request::builder()
            .uri(format!("http://{addr}/"))
            .body(Body::empty())
            .unwrap();

        let response = forwarder.forward(request).await;
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert!(response.headers().get("keep-alive").is_none());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"tea");
    }

    #[tokio::test]
    async fn body_stalled_after_head_is_cut_off() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let _ = socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\npartial")
                .await;
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let forwarder = HyperForwarder::new(Duration::from_millis(200));
        let request = Request::builder()
            .uri(format!("http://{addr}/"))
            .body(Body::empty())
            .unwrap();

        let response = forwarder.forward(request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = tokio::time::timeout(
            Duration::from_secs(2),
            axum::body::to_bytes(response.into_body(), usize::MAX),
        )
        .await
        .expect("stalled body was not cut off");
        assert!(body.is_err());
    }
}
