//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration and work out the listener plan
//! - Compile the routing table and load TLS material
//! - Build one router per listener and start the listeners
//!
//! # Design Decisions
//! - Fail fast: config and certificate errors surface before any bind
//! - Listeners start last (traffic only when ready)
//! - Stop handles are created before the run so callers (tests, the
//!   signal task) can observe and stop listeners

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::{validate_config, ConfigError, ListenerPlan, ProxyConfig, ValidationError};
use crate::http::{build_router, AppState, ForwardingEngine, HyperForwarder};
use crate::lifecycle::coordinator::{run_standalone, LifecycleError, ListenerCoordinator};
use crate::net::{load_tls_material, serve_plain, serve_tls, ServerStopHandle, TlsError, TlsMaterial};
use crate::routing::{RoutingTable, Scheme};

/// Error type for everything that can fail before listening.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to load TLS material: {0}")]
    Tls(#[from] TlsError),
}

/// Stop handles for the listeners of one run.
#[derive(Debug, Clone)]
pub struct ProxyHandles {
    pub http: ServerStopHandle,
    pub https: ServerStopHandle,
}

/// A validated proxy, ready to start listening.
pub struct Proxy {
    config: ProxyConfig,
    plan: ListenerPlan,
    table: Arc<RoutingTable>,
    tls: Option<TlsMaterial>,
    forwarder: Arc<dyn ForwardingEngine>,
}

impl Proxy {
    /// Validate `config` and prepare everything the listeners need.
    ///
    /// This is where semantic validation happens; loading only parses.
    pub fn new(config: ProxyConfig) -> Result<Self, StartupError> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        let plan = config
            .listener_plan()
            .ok_or_else(|| ConfigError::Validation(vec![ValidationError::NoListener]))?;

        let table = RoutingTable::from_mappings(&config.mapping).map_err(ConfigError::Validation)?;
        tracing::info!(routes = table.len(), "Routing table compiled");

        let tls = if plan.needs_tls() {
            let material = load_tls_material(&config.tls_files)?;
            if material.is_empty() {
                tracing::warn!("TLS listener configured without certificates");
            }
            Some(material)
        } else {
            None
        };

        let forwarder = Arc::new(HyperForwarder::new(Duration::from_secs(
            config.timeouts.write_secs,
        )));

        Ok(Self {
            config,
            plan,
            table: Arc::new(table),
            tls,
            forwarder,
        })
    }

    /// Replace the forwarding engine.
    pub fn with_forwarder(mut self, forwarder: Arc<dyn ForwardingEngine>) -> Self {
        self.forwarder = forwarder;
        self
    }

    pub fn plan(&self) -> ListenerPlan {
        self.plan
    }

    pub fn routing_table(&self) -> &RoutingTable {
        &self.table
    }

    /// Fresh stop handles, with the configured drain period.
    pub fn handles(&self) -> ProxyHandles {
        let grace = Duration::from_secs(self.config.timeouts.shutdown_grace_secs);
        ProxyHandles {
            http: ServerStopHandle::new(grace),
            https: ServerStopHandle::new(grace),
        }
    }

    fn router(&self, scheme: Scheme) -> axum::Router {
        let state = AppState::new(self.table.clone(), self.forwarder.clone(), scheme);
        build_router(state, &self.config.timeouts)
    }

    /// Serve until the listeners stop.
    ///
    /// `stop_signal` resolving stops the plaintext listener (or the only
    /// listener); in dual mode the TLS listener follows it.
    pub async fn run<S>(self, handles: ProxyHandles, stop_signal: S) -> Result<(), LifecycleError>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let read_timeout = Duration::from_secs(self.config.timeouts.read_secs);
        let tls = self.tls.clone().unwrap_or_default();

        match self.plan {
            ListenerPlan::Plain(addr) => {
                tracing::info!(address = %addr, "Starting plaintext listener");
                let serve = serve_plain(
                    addr,
                    self.router(Scheme::Http),
                    handles.http.server_handle().clone(),
                    read_timeout,
                );
                run_standalone(Scheme::Http, handles.http, serve, stop_signal).await
            }
            ListenerPlan::Tls(addr) => {
                tracing::info!(address = %addr, "Starting TLS listener");
                let serve = serve_tls(
                    addr,
                    self.router(Scheme::Https),
                    handles.https.server_handle().clone(),
                    tls,
                    read_timeout,
                );
                run_standalone(Scheme::Https, handles.https, serve, stop_signal).await
            }
            ListenerPlan::Dual { http, https } => {
                tracing::info!(http = %http, https = %https, "Starting plaintext and TLS listeners");
                let plain = serve_plain(
                    http,
                    self.router(Scheme::Http),
                    handles.http.server_handle().clone(),
                    read_timeout,
                );
                let secure = serve_tls(
                    https,
                    self.router(Scheme::Https),
                    handles.https.server_handle().clone(),
                    tls,
                    read_timeout,
                );
                ListenerCoordinator::new(handles.http, handles.https)
                    .run(plain, secure, stop_signal)
                    .await
            }
        }
    }
}
