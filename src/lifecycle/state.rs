//! Relay state machine values.
//!
//! # State Transitions
//! ```text
//! Stopped  → Starting: start() accepted
//! Starting → Running:  both listeners bound, tasks launched
//! Starting → Stopped:  bind/launch failed, partial resources released
//! Running  → Stopping: stop() accepted
//! Stopping → Stopped:  all listeners and connections torn down
//! Stopping → Running:  teardown failed
//! ```

use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Current relay state. Serialized lowercase for the control API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl ServerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerState::Stopped => "stopped",
            ServerState::Starting => "starting",
            ServerState::Running => "running",
            ServerState::Stopping => "stopping",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => ServerState::Starting,
            2 => ServerState::Running,
            3 => ServerState::Stopping,
            _ => ServerState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ServerState::Stopped => 0,
            ServerState::Starting => 1,
            ServerState::Running => 2,
            ServerState::Stopping => 3,
        }
    }
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock-free cell holding the state so `status()` never waits on a transition.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new(state: ServerState) -> Self {
        Self(AtomicU8::new(state.as_u8()))
    }

    pub(crate) fn get(&self) -> ServerState {
        ServerState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: ServerState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }
}
