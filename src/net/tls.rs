//! TLS configuration and certificate loading.
//!
//! # Responsibilities
//! - Read PEM certificate chains and private keys from disk
//! - Pick a certificate per handshake from the client's SNI name
//! - Produce the rustls config the TLS listener serves with
//!
//! # Design Decisions
//! - All material is loaded before any listener starts; failures are fatal
//! - The first certificate valid for the SNI name wins; without a match
//!   (or without SNI) the first configured certificate is served
//! - An empty set loads fine; the TLS listener refuses to start with it

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use rustls::crypto::{aws_lc_rs, CryptoProvider};
use rustls::pki_types::ServerName;
use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use rustls::ServerConfig;
use thiserror::Error;

use crate::config::TlsFiles;

/// Error type for TLS material loading.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no certificates found in {path:?}")]
    NoCertificates { path: PathBuf },

    #[error("no private key found in {path:?}")]
    NoPrivateKey { path: PathBuf },

    #[error("unusable private key in {path:?}: {source}")]
    InvalidKey {
        path: PathBuf,
        #[source]
        source: rustls::Error,
    },

    #[error("invalid TLS configuration: {0}")]
    Config(#[from] rustls::Error),
}

/// Certificates served by the TLS listener, selected by SNI.
#[derive(Debug, Default)]
pub struct CertificateStore {
    keys: Vec<Arc<CertifiedKey>>,
}

impl CertificateStore {
    pub fn new(keys: Vec<Arc<CertifiedKey>>) -> Self {
        Self { keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Certificate to present for `server_name`.
    pub fn select(&self, server_name: Option<&str>) -> Option<Arc<CertifiedKey>> {
        let by_name = server_name
            .and_then(|name| ServerName::try_from(name).ok())
            .and_then(|name| self.keys.iter().find(|key| is_valid_for(key, &name)));

        by_name.or_else(|| self.keys.first()).cloned()
    }
}

fn is_valid_for(key: &CertifiedKey, name: &ServerName<'_>) -> bool {
    key.end_entity_cert()
        .ok()
        .and_then(|der| webpki::EndEntityCert::try_from(der).ok())
        .is_some_and(|cert| cert.verify_is_valid_for_subject_name(name).is_ok())
}

impl ResolvesServerCert for CertificateStore {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        let selected = self.select(client_hello.server_name());
        if selected.is_none() {
            tracing::warn!(sni = ?client_hello.server_name(), "No certificate to present");
        }
        selected
    }
}

/// Loaded certificate material, immutable after load.
#[derive(Debug, Clone, Default)]
pub struct TlsMaterial {
    store: Arc<CertificateStore>,
}

impl TlsMaterial {
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn store(&self) -> &CertificateStore {
        &self.store
    }

    /// Build the rustls server config, advertising http/1.1 only.
    pub fn server_config(&self) -> Result<Arc<ServerConfig>, TlsError> {
        let mut config = ServerConfig::builder_with_provider(Arc::new(provider()))
            .with_safe_default_protocol_versions()?
            .with_no_client_auth()
            .with_cert_resolver(self.store.clone());
        config.alpn_protocols = vec![b"http/1.1".to_vec()];
        Ok(Arc::new(config))
    }

    /// Config in the form `axum-server` accepts.
    pub fn rustls_config(&self) -> Result<RustlsConfig, TlsError> {
        Ok(RustlsConfig::from_config(self.server_config()?))
    }
}

fn provider() -> CryptoProvider {
    aws_lc_rs::default_provider()
}

/// Load every certificate/key pair, in order.
pub fn load_tls_material(files: &[TlsFiles]) -> Result<TlsMaterial, TlsError> {
    let provider = provider();
    let mut keys = Vec::with_capacity(files.len());

    for pair in files {
        let key = load_certified_key(Path::new(&pair.cert_file), Path::new(&pair.key_file), &provider)?;
        tracing::debug!(cert = %pair.cert_file, "Loaded certificate");
        keys.push(Arc::new(key));
    }

    Ok(TlsMaterial {
        store: Arc::new(CertificateStore::new(keys)),
    })
}

fn load_certified_key(
    cert_path: &Path,
    key_path: &Path,
    provider: &CryptoProvider,
) -> Result<CertifiedKey, TlsError> {
    let mut cert_reader = open(cert_path)?;
    let certs = rustls_pemfile::certs(&mut cert_reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Read {
            path: cert_path.to_path_buf(),
            source,
        })?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates {
            path: cert_path.to_path_buf(),
        });
    }

    let mut key_reader = open(key_path)?;
    let key_der = rustls_pemfile::private_key(&mut key_reader)
        .map_err(|source| TlsError::Read {
            path: key_path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey {
            path: key_path.to_path_buf(),
        })?;

    let signing_key = provider
        .key_provider
        .load_private_key(key_der)
        .map_err(|source| TlsError::InvalidKey {
            path: key_path.to_path_buf(),
            source,
        })?;

    Ok(CertifiedKey::new(certs, signing_key))
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })
}
