//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (JSON)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, once, when the proxy is built)
//!     → ProxyConfig (validated, immutable)
//!     → routing table, TLS material and listener plan built from it
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - Optional sections have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    ListenerPlan, MappingConfig, ObservabilityConfig, ProxyConfig, TimeoutConfig, TlsFiles,
};
pub use validation::{mapping_criterion, validate_config, ValidationError};
