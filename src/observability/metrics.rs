//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by listener, outcome, status
//! - `proxy_request_duration_seconds` (histogram): latency by listener, outcome
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Prometheus exporter is optional and off by default

use std::net::SocketAddr;
use std::time::Instant;

use axum::http::StatusCode;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::routing::Scheme;

/// How the dispatch handler disposed of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Matched a route and went to the forwarding engine.
    Forwarded,
    /// No route matched.
    Unrouted,
    /// Matched, but the backend request could not be built.
    Rejected,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Forwarded => "forwarded",
            Outcome::Unrouted => "unrouted",
            Outcome::Rejected => "rejected",
        }
    }
}

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one dispatched request.
pub fn record_request(listener: Scheme, outcome: Outcome, status: StatusCode, start: Instant) {
    let listener = listener.as_str();
    let outcome = outcome.as_str();

    ::metrics::counter!(
        "proxy_requests_total",
        "listener" => listener,
        "outcome" => outcome,
        "status" => status.as_u16().to_string()
    )
    .increment(1);

    ::metrics::histogram!(
        "proxy_request_duration_seconds",
        "listener" => listener,
        "outcome" => outcome
    )
    .record(start.elapsed().as_secs_f64());
}
