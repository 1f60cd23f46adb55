//! Lifecycle controller: owner of the relay state machine and listener resources.
//!
//! `start` and `stop` serialize on an async mutex that also guards the
//! listener handles, so the state check and the transition happen under one
//! lock. `status` reads an atomic and never waits.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::RelayConfig;
use crate::hub::{Hub, Protocol};
use crate::lifecycle::startup::{self, ListenerAddrs, ListenerHandles};
use crate::lifecycle::state::{ServerState, StateCell};
use crate::net::{ConnectionRegistry, ListenerError};
use crate::observability::metrics;

/// Time given to aborted connection routines to unwind.
const ABORT_GRACE: Duration = Duration::from_millis(250);

/// Errors surfaced by lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A listener could not be bound; nothing was left running.
    #[error("failed to start {protocol} listener on {address}: {source}")]
    Bind {
        protocol: Protocol,
        address: String,
        #[source]
        source: ListenerError,
    },

    /// Teardown did not complete; the relay is still running.
    #[error("failed to stop listeners: {0}")]
    Teardown(String),
}

/// Result of a `start` call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Listeners are bound and running.
    Started(ListenerAddrs),
    /// Nothing was done; the relay was already in the given state.
    AlreadyActive(ServerState),
}

/// Result of a `stop` call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Listeners and connections are gone.
    Stopped,
    /// Nothing was done; the relay was in the given state.
    NotRunning(ServerState),
}

/// Owns the relay state and the two ingestion listeners.
pub struct LifecycleController {
    state: StateCell,
    handles: Mutex<Option<ListenerHandles>>,
    config: ArcSwap<RelayConfig>,
    hub: Hub,
    registry: ConnectionRegistry,
}

impl LifecycleController {
    pub fn new(config: RelayConfig, hub: Hub) -> Self {
        Self {
            state: StateCell::new(ServerState::Stopped),
            handles: Mutex::new(None),
            config: ArcSwap::from_pointee(config),
            hub,
            registry: ConnectionRegistry::new(),
        }
    }

    /// Current state. Never blocks.
    pub fn status(&self) -> ServerState {
        self.state.get()
    }

    /// Bind and launch both listeners.
    pub async fn start(&self) -> Result<StartOutcome, LifecycleError> {
        let current = self.state.get();
        if current != ServerState::Stopped {
            tracing::info!(state = %current, "Start ignored, relay already active");
            return Ok(StartOutcome::AlreadyActive(current));
        }

        let mut handles = self.handles.lock().await;
        let current = self.state.get();
        if current != ServerState::Stopped {
            tracing::info!(state = %current, "Start ignored, relay already active");
            return Ok(StartOutcome::AlreadyActive(current));
        }

        self.transition(ServerState::Starting);
        let config = self.config.load_full();

        match startup::launch(&config, &self.hub, &self.registry).await {
            Ok(launched) => {
                let addrs = launched.addrs;
                *handles = Some(launched);
                self.transition(ServerState::Running);
                tracing::info!(
                    stream = %addrs.stream,
                    datagram = %addrs.datagram,
                    "Listeners started"
                );
                Ok(StartOutcome::Started(addrs))
            }
            Err(e) => {
                self.transition(ServerState::Stopped);
                tracing::error!(error = %e, "Failed to start listeners");
                Err(e)
            }
        }
    }

    /// Tear down both listeners and every active stream connection.
    pub async fn stop(&self) -> Result<StopOutcome, LifecycleError> {
        let current = self.state.get();
        if current != ServerState::Running {
            tracing::info!(state = %current, "Stop ignored, relay not running");
            return Ok(StopOutcome::NotRunning(current));
        }

        let mut guard = self.handles.lock().await;
        let current = self.state.get();
        if current != ServerState::Running {
            tracing::info!(state = %current, "Stop ignored, relay not running");
            return Ok(StopOutcome::NotRunning(current));
        }

        let Some(mut handles) = guard.take() else {
            tracing::error!("Running without listener handles, forcing stopped");
            self.transition(ServerState::Stopped);
            return Ok(StopOutcome::Stopped);
        };

        self.transition(ServerState::Stopping);
        match self.teardown(&mut handles).await {
            Ok(()) => {
                self.transition(ServerState::Stopped);
                tracing::info!("Listeners stopped");
                Ok(StopOutcome::Stopped)
            }
            Err(e) => {
                *guard = Some(handles);
                self.transition(ServerState::Running);
                tracing::error!(error = %e, "Failed to stop listeners, still running");
                Err(e)
            }
        }
    }

    /// Addresses of the running listeners, if any.
    pub async fn listener_addrs(&self) -> Option<ListenerAddrs> {
        self.handles.lock().await.as_ref().map(|handles| handles.addrs)
    }

    /// Number of stream connections currently being handled.
    pub fn active_connections(&self) -> usize {
        self.registry.len()
    }

    /// Replace the configuration used by the next `start`.
    pub fn update_config(&self, config: RelayConfig) {
        self.config.store(Arc::new(config));
        tracing::info!(state = %self.status(), "Configuration updated, applies on next start");
    }

    pub fn config(&self) -> Arc<RelayConfig> {
        self.config.load_full()
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    fn grace(&self) -> Duration {
        Duration::from_millis(self.config.load().lifecycle.shutdown_grace_ms)
    }

    fn transition(&self, to: ServerState) {
        let from = self.state.get();
        self.state.set(to);
        metrics::record_transition(to);
        tracing::info!(from = %from, to = %to, "State transition");
    }

    async fn teardown(&self, handles: &mut ListenerHandles) -> Result<(), LifecycleError> {
        let grace = self.grace();

        // 1. Datagram socket: closing it is all there is to do.
        if let Some(task) = handles.datagram_task.take() {
            handles.datagram_shutdown.trigger();
            join_best_effort(task, grace, "datagram listener").await;
        }

        // 2. Cancel in-flight stream connections and wait for acknowledgement.
        handles.connection_shutdown.trigger();
        let active = self.registry.len();
        if active > 0 {
            tracing::info!(connections = active, "Cancelling active stream connections");
        }
        self.drain_connections(grace).await;

        // 3. Stop accepting and close the listening socket.
        handles.accept_shutdown.trigger();
        if let Some(mut task) = handles.accept_task.take() {
            match tokio::time::timeout(grace, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    return Err(LifecycleError::Teardown(format!("stream accept loop failed: {}", e)));
                }
                Err(_) => {
                    handles.accept_task = Some(task);
                    return Err(LifecycleError::Teardown(format!(
                        "stream accept loop did not exit within {}ms",
                        grace.as_millis()
                    )));
                }
            }
        }

        // 4. Connections accepted between steps 2 and 3 start already cancelled.
        self.drain_connections(grace).await;

        Ok(())
    }

    /// Wait for the registry to empty, aborting routines that outlive `grace`.
    async fn drain_connections(&self, grace: Duration) {
        if self.registry.wait_until_empty(grace).await {
            return;
        }
        for (id, peer) in self.registry.abort_all() {
            tracing::error!(
                connection_id = %id,
                peer_addr = %peer,
                grace_ms = grace.as_millis() as u64,
                "Connection ignored cancellation, aborting"
            );
        }
        if !self.registry.wait_until_empty(ABORT_GRACE).await {
            let leaked = self.registry.clear();
            tracing::error!(connections = leaked, "Dropped unresponsive connections from registry");
        }
    }
}

/// Await a listener task; faults are logged, never returned.
async fn join_best_effort(mut task: JoinHandle<()>, grace: Duration, name: &'static str) {
    match tokio::time::timeout(grace, &mut task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(task = name, error = %e, "Listener task failed"),
        Err(_) => {
            tracing::error!(task = name, "Listener task did not exit, aborting");
            task.abort();
        }
    }
}
