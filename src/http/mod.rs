//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Plaintext or TLS connection
//!     → server.rs (Axum router, middleware, dispatch handler)
//!     → request.rs (request ID, ProxyRequest snapshot)
//!     → routing table decides backend
//!     → rewrite.rs (localhost authority, X-Forwarded-*)
//!     → forward.rs (forwarding engine, streamed response)
//!     → Send to client
//! ```

pub mod forward;
pub mod request;
pub mod rewrite;
pub mod server;

pub use forward::{ForwardingEngine, HyperForwarder};
pub use request::{ProxyRequest, UuidRequestId, X_REQUEST_ID};
pub use rewrite::{rewrite, RewriteError, RewrittenRequest, BACKEND_HOST};
pub use server::{build_router, dispatch, AppState};
