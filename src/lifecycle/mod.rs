//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! start() (controller.rs → startup.rs):
//!     Stopped → Starting → bind stream → bind datagram → launch tasks → Running
//!     any failure → release what was bound → Stopped
//!
//! stop() (controller.rs):
//!     Running → Stopping → close datagram → cancel + await connections
//!     → stop accepting → close stream socket → Stopped
//!
//! Cancellation (shutdown.rs):
//!     watch-based signal observed by every listener and connection task
//!
//! Signals (signals.rs):
//!     SIGINT → process shutdown
//! ```
//!
//! # Design Decisions
//! - One async mutex serializes start/stop; status() reads an atomic
//! - Connection shutdown has a grace period; stragglers are aborted and logged
//! - Teardown failure restores Running rather than leaving a half-stopped state

pub mod controller;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod state;

pub use controller::{LifecycleController, LifecycleError, StartOutcome, StopOutcome};
pub use shutdown::{Shutdown, ShutdownSignal};
pub use startup::ListenerAddrs;
pub use state::ServerState;
