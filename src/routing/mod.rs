//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (host, listener scheme)
//!     → table.rs (ordered route lookup)
//!     → matcher.rs (evaluate host + transport conditions)
//!     → Return: matched RouteEntry or NoMatch
//!
//! Route Compilation (at startup):
//!     MappingConfig[]
//!     → Compile host + transport matchers
//!     → Freeze as immutable RoutingTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Deterministic: same input always matches same route
//! - First match wins (configuration order)

pub mod matcher;
pub mod table;

pub use matcher::{HostMatcher, Matcher, RequestKey, Scheme, TransportMatcher};
pub use table::{RouteEntry, RoutingTable};
