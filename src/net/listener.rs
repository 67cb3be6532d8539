//! Plaintext and TLS listeners.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Serve the per-listener router with `axum-server`
//! - Terminate TLS with the loaded certificate set
//! - Stop gracefully through a shared handle
//!
//! # Design Decisions
//! - Binding happens inside the listener task, so a bind failure is a
//!   listener failure like any other and goes through mutual shutdown
//! - Header read timeout enforced by hyper; response timeout by the
//!   forwarding engine
//! - TLS advertises only http/1.1, so every TLS connection gets the
//!   header read timeout

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum_server::Handle;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::lifecycle::shutdown::StopHandle;
use crate::net::tls::{TlsError, TlsMaterial};

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// TLS listener started with an empty certificate set.
    #[error("no TLS certificates configured")]
    NoCertificates,

    #[error(transparent)]
    Tls(#[from] TlsError),

    /// Serving failed after bind.
    #[error("listener I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stops one listener: stop accepting, drain for at most `grace`.
#[derive(Debug, Clone)]
pub struct ServerStopHandle {
    handle: Handle,
    grace: Duration,
    /// Flips to `true` on the first stop request and stays there.
    requested: Arc<watch::Sender<bool>>,
}

impl ServerStopHandle {
    pub fn new(grace: Duration) -> Self {
        let (requested, _) = watch::channel(false);
        Self {
            handle: Handle::new(),
            grace,
            requested: Arc::new(requested),
        }
    }

    /// The `axum-server` handle the listener serves with.
    pub fn server_handle(&self) -> &Handle {
        &self.handle
    }

    /// Wait until the listener is bound; `None` if it failed first.
    pub async fn listening(&self) -> Option<SocketAddr> {
        self.handle.listening().await
    }

    /// Connections currently being served.
    pub fn connection_count(&self) -> usize {
        self.handle.connection_count()
    }
}

#[async_trait]
impl StopHandle for ServerStopHandle {
    fn request_stop(&self) {
        self.handle.graceful_shutdown(Some(self.grace));
        self.requested.send_replace(true);
    }

    async fn stop_requested(&self) {
        let mut requested = self.requested.subscribe();
        // The sender lives as long as `self`, so this only ends on `true`.
        let _ = requested.wait_for(|requested| *requested).await;
    }
}

async fn bind(addr: SocketAddr) -> Result<std::net::TcpListener, ListenerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ListenerError::Bind { addr, source })?;
    let local_addr = listener.local_addr()?;
    tracing::info!(address = %local_addr, "Listener bound");
    Ok(listener.into_std()?)
}

/// HTTP/1 gets a header read timeout. HTTP/2 (prior-knowledge h2c) has
/// no header timeout in hyper; keep-alive pings drop peers that go silent.
fn apply_read_timeouts(builder: &mut AutoBuilder<TokioExecutor>, read_timeout: Duration) {
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(read_timeout);
    builder
        .http2()
        .timer(TokioTimer::new())
        .keep_alive_interval(read_timeout)
        .keep_alive_timeout(read_timeout);
}

/// Serve `app` over plaintext until the handle stops it.
pub async fn serve_plain(
    addr: SocketAddr,
    app: Router,
    handle: Handle,
    read_timeout: Duration,
) -> Result<(), ListenerError> {
    let listener = bind(addr).await?;

    let mut server = axum_server::from_tcp(listener).handle(handle);
    apply_read_timeouts(server.http_builder(), read_timeout);

    server
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await?;
    Ok(())
}

/// Serve `app` over TLS until the handle stops it.
pub async fn serve_tls(
    addr: SocketAddr,
    app: Router,
    handle: Handle,
    material: TlsMaterial,
    read_timeout: Duration,
) -> Result<(), ListenerError> {
    if material.is_empty() {
        return Err(ListenerError::NoCertificates);
    }
    let config = material.rustls_config()?;
    let listener = bind(addr).await?;
    tracing::info!(certificates = material.len(), "TLS configured");

    let mut server = axum_server::from_tcp_rustls(listener, config).handle(handle);
    apply_read_timeouts(server.http_builder(), read_timeout);

    server
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await?;
    Ok(())
}
