//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled routes in configuration order
//! - Look up the first route matching a request
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan, first match wins; overlapping entries are allowed
//! - Explicit NoMatch rather than silent default

use crate::config::{mapping_criterion, MappingConfig, ValidationError};
use crate::routing::matcher::{HostMatcher, Matcher, RequestKey, Scheme, TransportMatcher};

/// One static rule: matching requests go to `localhost:<backend_port>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    host: HostMatcher,
    transport: TransportMatcher,
    backend_port: u16,
}

impl RouteEntry {
    pub fn new(host: impl Into<String>, transport: TransportMatcher, backend_port: u16) -> Self {
        Self {
            host: HostMatcher::new(host),
            transport,
            backend_port,
        }
    }

    /// Compile a config mapping. `index` is only used for error reporting.
    pub fn from_mapping(index: usize, mapping: &MappingConfig) -> Result<Self, ValidationError> {
        let transport = mapping_criterion(index, mapping)?;
        Ok(Self::new(mapping.host.as_str(), transport, mapping.port))
    }

    pub fn host(&self) -> &str {
        self.host.host()
    }

    pub fn transport(&self) -> TransportMatcher {
        self.transport
    }

    pub fn backend_port(&self) -> u16 {
        self.backend_port
    }
}

impl Matcher for RouteEntry {
    fn matches(&self, key: &RequestKey<'_>) -> bool {
        self.host.matches(key) && self.transport.matches(key)
    }
}

/// Ordered routing table, first match wins.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    entries: Vec<RouteEntry>,
}

impl RoutingTable {
    pub fn new(entries: Vec<RouteEntry>) -> Self {
        Self { entries }
    }

    /// Compile config mappings, keeping their order.
    pub fn from_mappings(mappings: &[MappingConfig]) -> Result<Self, Vec<ValidationError>> {
        let mut entries = Vec::with_capacity(mappings.len());
        let mut errors = Vec::new();
        for (index, mapping) in mappings.iter().enumerate() {
            match RouteEntry::from_mapping(index, mapping) {
                Ok(entry) => entries.push(entry),
                Err(e) => errors.push(e),
            }
        }
        if errors.is_empty() {
            Ok(Self::new(entries))
        } else {
            Err(errors)
        }
    }

    /// First entry whose host and transport criterion both accept the request.
    pub fn lookup(&self, host: &str, scheme: Scheme) -> Option<&RouteEntry> {
        let key = RequestKey::new(host, scheme);
        self.entries.iter().find(|entry| entry.matches(&key))
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
