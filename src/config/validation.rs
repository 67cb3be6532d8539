//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Every mapping names exactly one match criterion
//! - Validate value ranges (backend ports non-zero, listener ports distinct)
//! - Exactly one usable listener layout
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system
//! - Overlapping mappings are legal; order decides

use thiserror::Error;

use crate::config::schema::{MappingConfig, ProxyConfig};
use crate::routing::TransportMatcher;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("mapping #{index} has an empty host")]
    EmptyHost { index: usize },

    #[error("mapping #{index} host {host:?} includes a port; request hosts are matched without one")]
    HostWithPort { index: usize, host: String },

    #[error("mapping #{index} ({host}) must set either `scheme` or `use_tls`")]
    MissingCriterion { index: usize, host: String },

    #[error("mapping #{index} ({host}) sets both `scheme` and `use_tls`")]
    AmbiguousCriterion { index: usize, host: String },

    #[error("mapping #{index} ({host}) has backend port 0")]
    ZeroBackendPort { index: usize, host: String },

    #[error("no listener configured: set `http_port`/`https_port` or `listen_port`")]
    NoListener,

    #[error("`listen_port` cannot be combined with `http_port` or `https_port`")]
    ConflictingListeners,

    #[error("`http_port` and `https_port` are both {port}")]
    SharedListenerPort { port: u16 },
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (index, mapping) in config.mapping.iter().enumerate() {
        if mapping.host.trim().is_empty() {
            errors.push(ValidationError::EmptyHost { index });
        } else if has_port(&mapping.host) {
            errors.push(ValidationError::HostWithPort {
                index,
                host: mapping.host.clone(),
            });
        }
        if let Err(e) = mapping_criterion(index, mapping) {
            errors.push(e);
        }
        if mapping.port == 0 {
            errors.push(ValidationError::ZeroBackendPort {
                index,
                host: mapping.host.clone(),
            });
        }
    }

    match (config.listen_port, config.http_port, config.https_port) {
        (None, None, None) => errors.push(ValidationError::NoListener),
        (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
            errors.push(ValidationError::ConflictingListeners)
        }
        // Port 0 binds an ephemeral port on each listener, so it may repeat.
        (None, Some(http), Some(https)) if http == https && http != 0 => {
            errors.push(ValidationError::SharedListenerPort { port: http })
        }
        _ => {}
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// The mapping's match criterion; exactly one of `scheme` and `use_tls`.
pub fn mapping_criterion(index: usize, mapping: &MappingConfig) -> Result<TransportMatcher, ValidationError> {
    mapping.transport().ok_or_else(|| {
        let host = mapping.host.clone();
        if mapping.scheme.is_some() {
            ValidationError::AmbiguousCriterion { index, host }
        } else {
            ValidationError::MissingCriterion { index, host }
        }
    })
}

/// `a.test:8080` or `[::1]:8080`; bare IPv6 literals do not count.
fn has_port(host: &str) -> bool {
    match host.rsplit_once(':') {
        Some((name, port)) => {
            !port.is_empty()
                && port.bytes().all(|b| b.is_ascii_digit())
                && (!name.contains(':') || name.ends_with(']'))
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::MappingConfig;
    use crate::routing::Scheme;

    fn base() -> ProxyConfig {
        ProxyConfig {
            mapping: vec![MappingConfig::with_scheme("a.test", Scheme::Http, 9001)],
            http_port: Some(8080),
            ..ProxyConfig::default()
        }
    }

    #[test]
    fn accepts_minimal_config() {
        assert_eq!(validate_config(&base()), Ok(()));
    }

    #[test]
    fn reports_every_mapping_problem() {
        let mut config = base();
        config.mapping.push(MappingConfig {
            host: " ".into(),
            scheme: None,
            use_tls: None,
            port: 0,
        });
        config.mapping.push(MappingConfig {
            host: "c.test".into(),
            scheme: Some(Scheme::Https),
            use_tls: Some(true),
            port: 9003,
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::EmptyHost { index: 1 },
                ValidationError::MissingCriterion { index: 1, host: " ".into() },
                ValidationError::ZeroBackendPort { index: 1, host: " ".into() },
                ValidationError::AmbiguousCriterion { index: 2, host: "c.test".into() },
            ]
        );
    }

    #[test]
    fn rejects_bad_listener_layouts() {
        let mut config = base();
        config.http_port = None;
        assert_eq!(validate_config(&config), Err(vec![ValidationError::NoListener]));

        config.listen_port = Some(8000);
        config.https_port = Some(8443);
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::ConflictingListeners])
        );

        config.listen_port = None;
        config.http_port = Some(8443);
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::SharedListenerPort { port: 8443 }])
        );
    }

    #[test]
    fn rejects_host_with_port() {
        let mut config = base();
        config.mapping.push(MappingConfig::with_scheme("b.test:8080", Scheme::Http, 9002));
        config.mapping.push(MappingConfig::with_scheme("[::1]:8080", Scheme::Http, 9003));
        config.mapping.push(MappingConfig::with_scheme("[::1]", Scheme::Http, 9004));

        assert_eq!(
            validate_config(&config),
            Err(vec![
                ValidationError::HostWithPort { index: 1, host: "b.test:8080".into() },
                ValidationError::HostWithPort { index: 2, host: "[::1]:8080".into() },
            ])
        );
    }

    #[test]
    fn ephemeral_ports_may_repeat() {
        let mut config = base();
        config.http_port = Some(0);
        config.https_port = Some(0);
        assert_eq!(validate_config(&config), Ok(()));
    }
}
