//! Mutual shutdown of the plaintext and TLS listeners.
//!
//! Each listener owns a [`SiblingStopper`]: the transition it runs once it
//! starts stopping, either because a stop was requested or because its
//! serve loop ended. Both stoppers share one [`ShutdownState`] and one
//! [`CompletionSignal`]. The atomic swap on `other_done` decides the roles:
//! the listener that sees `false` stops its sibling, the one that sees
//! `true` signals completion. Neither can do both, so the surviving
//! listener is stopped exactly once and completion fires exactly once.
//!
//! ```text
//! Starting → Running → ShuttingDownFirst → ShuttingDownSecond → Stopped
//! ```

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::routing::Scheme;

/// Something that can be asked to stop accepting connections.
///
/// Implementations must tolerate being called after the listener already
/// stopped.
#[async_trait]
pub trait StopHandle: Send + Sync + 'static {
    fn request_stop(&self);

    /// Resolve once `request_stop` has been called, even if that happened
    /// before this was awaited.
    async fn stop_requested(&self);
}

/// Lifecycle phase, for observation only.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecyclePhase {
    Starting = 0,
    Running = 1,
    ShuttingDownFirst = 2,
    ShuttingDownSecond = 3,
    Stopped = 4,
}

impl From<u8> for LifecyclePhase {
    fn from(val: u8) -> Self {
        match val {
            0 => LifecyclePhase::Starting,
            1 => LifecyclePhase::Running,
            2 => LifecyclePhase::ShuttingDownFirst,
            3 => LifecyclePhase::ShuttingDownSecond,
            _ => LifecyclePhase::Stopped,
        }
    }
}

/// State shared by both listeners' stop transitions.
#[derive(Debug, Default)]
pub struct ShutdownState {
    /// Set by whichever listener stops first.
    other_done: AtomicBool,
    phase: AtomicU8,
}

impl ShutdownState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap the flag; returns its previous value.
    fn mark_stopped(&self) -> bool {
        self.other_done.swap(true, Ordering::AcqRel)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.other_done.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> LifecyclePhase {
        LifecyclePhase::from(self.phase.load(Ordering::Acquire))
    }

    /// Move forward to `phase`. Never moves backwards, so racing
    /// transitions cannot undo each other.
    pub fn advance(&self, phase: LifecyclePhase) {
        self.phase.fetch_max(phase as u8, Ordering::AcqRel);
    }
}

/// Single-fire completion signal.
#[derive(Debug, Clone)]
pub struct CompletionSignal {
    tx: Arc<watch::Sender<bool>>,
}

/// Waits for the [`CompletionSignal`].
#[derive(Debug)]
pub struct CompletionWaiter {
    rx: watch::Receiver<bool>,
}

impl CompletionSignal {
    pub fn channel() -> (Self, CompletionWaiter) {
        let (tx, rx) = watch::channel(false);
        (Self { tx: Arc::new(tx) }, CompletionWaiter { rx })
    }

    /// Fire the signal. Returns `true` only for the call that fired it.
    pub fn fire(&self) -> bool {
        self.tx.send_if_modified(|done| {
            if *done {
                false
            } else {
                *done = true;
                true
            }
        })
    }

    pub fn is_fired(&self) -> bool {
        *self.tx.borrow()
    }
}

impl CompletionWaiter {
    /// Resolve once the signal has fired.
    pub async fn wait(mut self) {
        if self.rx.wait_for(|done| *done).await.is_err() {
            // Every sender dropped without firing; nothing left to wait for.
            tracing::warn!("Completion signal dropped before firing");
        }
    }
}

/// What a listener's stop transition did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopTransition {
    /// First to stop: asked the sibling to stop.
    StoppedSibling,
    /// Second to stop: signalled completion.
    SignaledCompletion,
}

/// The stop transition of one listener.
#[derive(Debug)]
pub struct SiblingStopper<H> {
    listener: Scheme,
    sibling: H,
    state: Arc<ShutdownState>,
    completion: CompletionSignal,
    /// Set on the first call; the transition runs once per listener.
    ran: AtomicBool,
}

impl<H: StopHandle> SiblingStopper<H> {
    pub fn new(
        listener: Scheme,
        sibling: H,
        state: Arc<ShutdownState>,
        completion: CompletionSignal,
    ) -> Self {
        Self {
            listener,
            sibling,
            state,
            completion,
            ran: AtomicBool::new(false),
        }
    }

    /// Run when this listener starts stopping, for whatever reason.
    ///
    /// Returns `None` when the transition already ran for this listener.
    pub fn on_listener_stopped(&self) -> Option<StopTransition> {
        if self.ran.swap(true, Ordering::AcqRel) {
            return None;
        }

        let transition = if !self.state.mark_stopped() {
            self.state.advance(LifecyclePhase::ShuttingDownFirst);
            tracing::info!(listener = %self.listener, "Listener stopping first, stopping sibling");
            self.sibling.request_stop();
            StopTransition::StoppedSibling
        } else {
            self.state.advance(LifecyclePhase::ShuttingDownSecond);
            tracing::info!(listener = %self.listener, "Listener stopping second, signalling completion");
            if self.completion.fire() {
                self.state.advance(LifecyclePhase::Stopped);
            }
            StopTransition::SignaledCompletion
        };
        Some(transition)
    }
}

/// Runs the stop transition when dropped, so a listener task that
/// returns, errors, or panics always takes part in the protocol.
#[derive(Debug)]
pub struct StopOnExit<H: StopHandle> {
    stopper: Arc<SiblingStopper<H>>,
}

impl<H: StopHandle> StopOnExit<H> {
    pub fn new(stopper: Arc<SiblingStopper<H>>) -> Self {
        Self { stopper }
    }
}

impl<H: StopHandle> Drop for StopOnExit<H> {
    fn drop(&mut self) {
        self.stopper.on_listener_stopped();
    }
}
