//! Active stream connection registry.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Track every in-flight connection routine (guard on entry, removal on drop)
//! - Let the lifecycle controller wait for, and if needed abort, all routines

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::watch;
use tokio::task::AbortHandle;

use crate::observability::metrics;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug)]
struct ConnectionEntry {
    peer: SocketAddr,
    task: Option<AbortHandle>,
}

/// Set of currently active stream connections.
///
/// The live count is mirrored in a watch channel so shutdown can await
/// "registry empty" without polling.
#[derive(Debug, Clone)]
pub struct ConnectionRegistry {
    entries: Arc<DashMap<ConnectionId, ConnectionEntry>>,
    count_tx: Arc<watch::Sender<usize>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            entries: Arc::new(DashMap::new()),
            count_tx: Arc::new(tx),
        }
    }

    /// Record a new active connection. Returns a guard that deregisters on drop.
    pub fn register(&self, peer: SocketAddr) -> ConnectionGuard {
        let id = ConnectionId::new();
        self.entries.insert(id, ConnectionEntry { peer, task: None });
        self.count_tx.send_modify(|count| *count += 1);
        metrics::set_active_connections(*self.count_tx.borrow());

        ConnectionGuard {
            registry: self.clone(),
            id,
        }
    }

    /// Attach the handle of the task running a registered connection so a
    /// stuck routine can be aborted. No-op if the routine already finished.
    pub fn attach(&self, id: ConnectionId, task: AbortHandle) {
        if let Some(mut entry) = self.entries.get_mut(&id) {
            entry.task = Some(task);
        }
    }

    fn deregister(&self, id: ConnectionId) -> bool {
        let removed = self.entries.remove(&id).is_some();
        if removed {
            self.count_tx.send_modify(|count| *count = count.saturating_sub(1));
            metrics::set_active_connections(*self.count_tx.borrow());
        }
        removed
    }

    /// Get current active connection count.
    pub fn len(&self) -> usize {
        *self.count_tx.borrow()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until no connection is registered. Returns `false` on timeout.
    pub async fn wait_until_empty(&self, timeout: Duration) -> bool {
        let mut rx = self.count_tx.subscribe();
        let drained = matches!(
            tokio::time::timeout(timeout, rx.wait_for(|count| *count == 0)).await,
            Ok(Ok(_))
        );
        drained
    }

    /// Abort every registered routine, returning the ones that were still live.
    pub fn abort_all(&self) -> Vec<(ConnectionId, SocketAddr)> {
        let live: Vec<_> = self
            .entries
            .iter()
            .map(|entry| (*entry.key(), entry.peer, entry.task.clone()))
            .collect();

        live.into_iter()
            .map(|(id, peer, task)| {
                if let Some(task) = task {
                    task.abort();
                }
                (id, peer)
            })
            .collect()
    }

    /// Drop every remaining entry. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let ids: Vec<ConnectionId> = self.entries.iter().map(|entry| *entry.key()).collect();
        ids.into_iter().filter(|id| self.deregister(*id)).count()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that tracks a connection's lifetime.
/// Deregisters the connection when dropped, on every exit path including abort.
#[derive(Debug)]
pub struct ConnectionGuard {
    registry: ConnectionRegistry,
    id: ConnectionId,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.registry.deregister(self.id) {
            tracing::trace!(connection_id = %self.id, "Connection deregistered");
        }
    }
}
