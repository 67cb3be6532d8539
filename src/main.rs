//! Loopback reverse proxy.
//!
//! Forwards requests to backends on localhost, chosen by host and inbound
//! transport, over a plaintext and a TLS listener.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ net (plaintext | TLS listener)
//!                 │
//!                 ▼
//!              http::server (dispatch) ──▶ routing::table (first match)
//!                 │                              │ miss → 502
//!                 ▼                              ▼
//!              http::rewrite (localhost:port, X-Forwarded-*)
//!                 │
//!                 ▼
//!              http::forward ──────────────────────────────▶ Backend
//!
//!     lifecycle: the first listener to stop stops the other;
//!                the second signals completion and the process exits
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;

use loopback_proxy::config::load_config;
use loopback_proxy::lifecycle::{shutdown_signal, Proxy};
use loopback_proxy::observability::{logging, metrics};

const USAGE: &str = "Usage: loopback-proxy <config_file>";

#[derive(Parser)]
#[command(name = "loopback-proxy")]
#[command(about = "Host-routed reverse proxy for localhost backends", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON configuration file
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(_) => {
            println!("{USAGE}");
            return ExitCode::SUCCESS;
        }
    };

    if let Err(e) = logging::init_logging() {
        eprintln!("failed to initialize logging: {e}");
    }

    tracing::info!("loopback-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(path = %cli.config.display(), error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        mappings = config.mapping.len(),
        certificates = config.tls_files.len(),
        bind_address = %config.bind_address,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let proxy = match Proxy::new(config) {
        Ok(proxy) => proxy,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return ExitCode::FAILURE;
        }
    };

    let handles = proxy.handles();
    match proxy.run(handles, shutdown_signal()).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Proxy stopped with an error");
            ExitCode::FAILURE
        }
    }
}
