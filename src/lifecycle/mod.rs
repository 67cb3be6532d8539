//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate config → Compile routes → Load TLS → Start listeners
//!
//! Coordination (coordinator.rs):
//!     Spawn plaintext + TLS listener tasks → wait for completion → join
//!
//! Shutdown (shutdown.rs):
//!     Listener stops → first? stop sibling : signal completion
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → stop the plaintext listener
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then TLS, then listeners
//! - Neither listener outlives the other
//! - Shutdown drains for a bounded grace period

pub mod coordinator;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use coordinator::{run_standalone, LifecycleError, ListenerCoordinator};
pub use shutdown::{
    CompletionSignal, CompletionWaiter, LifecyclePhase, ShutdownState, SiblingStopper, StopHandle,
    StopOnExit, StopTransition,
};
pub use signals::shutdown_signal;
pub use startup::{Proxy, ProxyHandles, StartupError};
