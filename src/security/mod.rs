//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound request:
//!     → headers.rs (strip hop-by-hop, set X-Forwarded-*)
//!     → Forwarding engine
//! Backend response:
//!     → headers.rs (strip hop-by-hop)
//!     → Client
//! ```
//!
//! # Design Decisions
//! - X-Forwarded-For extends the client-supplied chain; the other
//!   X-Forwarded-* headers are always overwritten
//! - TLS terminates here; backends see the original scheme only
//!   through X-Forwarded-Proto

pub mod headers;

pub use headers::{strip_hop_by_hop, ForwardedHeaders};
