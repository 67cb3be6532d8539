//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bind, accept via axum-server)
//!     → tls.rs (TLS handshake, certificate chosen by SNI)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - TLS terminates here; backends are always reached in the clear
//! - Each listener is stopped through its own handle

pub mod listener;
pub mod tls;

pub use listener::{serve_plain, serve_tls, ListenerError, ServerStopHandle};
pub use tls::{load_tls_material, CertificateStore, TlsError, TlsMaterial};
