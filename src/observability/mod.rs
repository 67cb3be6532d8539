//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch handler, listeners, lifecycle produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (fmt subscriber)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through logs and to backends
//! - Metrics are cheap (no-op without an exporter)

pub mod logging;
pub mod metrics;
