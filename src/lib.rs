//! Loopback reverse proxy library.
//!
//! Routes requests by host and inbound transport to backends on localhost,
//! over a plaintext and a TLS listener that shut down together.

pub mod config;
pub mod http;
pub mod net;
pub mod routing;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::schema::ProxyConfig;
pub use lifecycle::{Proxy, ProxyHandles};
