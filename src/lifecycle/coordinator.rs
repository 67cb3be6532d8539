//! Listener lifecycle coordination.
//!
//! # Responsibilities
//! - Start the plaintext and TLS listeners concurrently
//! - Wire each listener's stop transition to the other's stop handle
//! - Forward an external stop request (signal) into the protocol
//! - Wait for the single completion signal, then collect both results
//!
//! # Design Decisions
//! - The shutdown state is created here and injected into both
//!   transitions; nothing is global
//! - A listener's transition runs as soon as its stop is requested, so
//!   both listeners stop accepting at once and drain in parallel
//! - Listener failures are returned, not panicked on, after both stopped

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::{
    CompletionSignal, LifecyclePhase, ShutdownState, SiblingStopper, StopHandle, StopOnExit,
};
use crate::net::ListenerError;
use crate::routing::Scheme;

/// Error type for a finished listener run.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{listener} listener failed: {source}")]
    Listener {
        listener: Scheme,
        #[source]
        source: ListenerError,
    },

    #[error("{listener} listener task panicked")]
    Panicked { listener: Scheme },
}

/// Runs a plaintext and a TLS listener so that neither outlives the other.
pub struct ListenerCoordinator<H> {
    plain: H,
    tls: H,
    state: Arc<ShutdownState>,
}

impl<H: StopHandle + Clone> ListenerCoordinator<H> {
    /// `plain` and `tls` stop the respective listener.
    pub fn new(plain: H, tls: H) -> Self {
        Self {
            plain,
            tls,
            state: Arc::new(ShutdownState::new()),
        }
    }

    /// Shared shutdown state, for observing the phase.
    pub fn state(&self) -> Arc<ShutdownState> {
        self.state.clone()
    }

    /// Drive both listeners to completion.
    ///
    /// `stop_signal` resolving asks the plaintext listener to stop; the
    /// protocol takes the TLS listener down with it.
    pub async fn run<P, T, S>(self, plain: P, tls: T, stop_signal: S) -> Result<(), LifecycleError>
    where
        P: Future<Output = Result<(), ListenerError>> + Send + 'static,
        T: Future<Output = Result<(), ListenerError>> + Send + 'static,
        S: Future<Output = ()> + Send + 'static,
    {
        let (completion, waiter) = CompletionSignal::channel();

        let plain_stopper = Arc::new(SiblingStopper::new(
            Scheme::Http,
            self.tls.clone(),
            self.state.clone(),
            completion.clone(),
        ));
        let tls_stopper = Arc::new(SiblingStopper::new(
            Scheme::Https,
            self.plain.clone(),
            self.state.clone(),
            completion,
        ));

        let plain_task = tokio::spawn(supervise(Scheme::Http, plain, self.plain.clone(), plain_stopper));
        let tls_task = tokio::spawn(supervise(Scheme::Https, tls, self.tls.clone(), tls_stopper));
        self.state.advance(LifecyclePhase::Running);
        tracing::info!("Listeners started");

        let signal_target = self.plain.clone();
        let signal_task = tokio::spawn(async move {
            stop_signal.await;
            tracing::info!("Stop requested");
            signal_target.request_stop();
        });

        waiter.wait().await;
        signal_task.abort();

        let plain_result = join_listener(Scheme::Http, plain_task).await;
        let tls_result = join_listener(Scheme::Https, tls_task).await;
        tracing::info!(phase = ?self.state.phase(), "Both listeners stopped");

        plain_result.and(tls_result)
    }
}

/// Run a single listener until it stops or `stop_signal` resolves.
pub async fn run_standalone<H, F, S>(
    listener: Scheme,
    handle: H,
    serve: F,
    stop_signal: S,
) -> Result<(), LifecycleError>
where
    H: StopHandle,
    F: Future<Output = Result<(), ListenerError>> + Send + 'static,
    S: Future<Output = ()> + Send + 'static,
{
    let task = tokio::spawn(serve);
    let signal_task = tokio::spawn(async move {
        stop_signal.await;
        tracing::info!(listener = %listener, "Stop requested");
        handle.request_stop();
    });

    let result = join_listener(listener, task).await;
    signal_task.abort();
    if let Err(e) = &result {
        tracing::error!(error = %e, "Listener failed");
    }
    result
}

/// Serve one listener, running its stop transition when a stop is
/// requested or, failing that, when serving ends.
async fn supervise<F, H>(
    listener: Scheme,
    serve: F,
    own: H,
    stopper: Arc<SiblingStopper<H>>,
) -> Result<(), ListenerError>
where
    F: Future<Output = Result<(), ListenerError>>,
    H: StopHandle,
{
    let exit = StopOnExit::new(stopper.clone());
    tokio::pin!(serve);

    let finished = tokio::select! {
        biased;
        result = &mut serve => Some(result),
        _ = own.stop_requested() => None,
    };
    let result = match finished {
        Some(result) => result,
        None => {
            stopper.on_listener_stopped();
            tracing::info!(listener = %listener, "Listener draining");
            serve.await
        }
    };

    match &result {
        Ok(()) => tracing::info!(listener = %listener, "Listener stopped"),
        Err(e) => tracing::error!(listener = %listener, error = %e, "Listener failed"),
    }
    drop(exit);
    result
}

async fn join_listener(
    listener: Scheme,
    task: JoinHandle<Result<(), ListenerError>>,
) -> Result<(), LifecycleError> {
    match task.await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(LifecycleError::Listener { listener, source }),
        Err(e) => {
            tracing::error!(listener = %listener, error = %e, "Listener task aborted");
            Err(LifecycleError::Panicked { listener })
        }
    }
}
