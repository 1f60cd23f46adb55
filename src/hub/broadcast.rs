//! Subscriber registry and fan-out.
//!
//! Each subscriber owns a bounded queue drained by its own push task.
//! `broadcast` only enqueues and never waits on a subscriber. Per-subscriber
//! order is the order in which `broadcast` was called.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::hub::envelope::Envelope;
use crate::observability::metrics;

/// Opaque identity of one push subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Outcome of one `broadcast` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers registered when the broadcast started.
    pub attempted: usize,
    /// Deliveries queued successfully.
    pub delivered: usize,
    /// Deliveries dropped (queue full or subscriber gone).
    pub failed: usize,
}

type Registry = DashMap<SubscriberId, mpsc::Sender<Arc<str>>>;

/// Fan-out hub. Cheap to clone; all clones share one registry.
#[derive(Debug, Clone)]
pub struct Hub {
    subscribers: Arc<Registry>,
    buffer: usize,
}

impl Hub {
    /// Create a hub whose subscribers each queue up to `buffer` messages.
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: Arc::new(DashMap::new()),
            buffer: buffer.max(1),
        }
    }

    /// Register a new subscriber. It receives every broadcast issued after this returns.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = SubscriberId::new();
        self.subscribers.insert(id, tx);
        metrics::set_subscribers(self.subscribers.len());
        tracing::debug!(subscriber_id = %id, "Subscriber registered");

        Subscription {
            id,
            rx,
            registry: Arc::clone(&self.subscribers),
        }
    }

    /// Remove a subscriber. Returns whether it was still registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        remove(&self.subscribers, id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver `envelope` to every current subscriber.
    ///
    /// Never fails as a whole: each subscriber either gets the message queued
    /// or is counted in `failed`. Subscribers whose queue is closed are pruned.
    pub fn broadcast(&self, envelope: &Envelope) -> BroadcastReport {
        let payload: Arc<str> = match serde_json::to_string(envelope) {
            Ok(json) => json.into(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize envelope");
                return BroadcastReport::default();
            }
        };

        // Snapshot so no shard lock is held while delivering.
        let targets: Vec<_> = self
            .subscribers
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let mut report = BroadcastReport {
            attempted: targets.len(),
            ..BroadcastReport::default()
        };

        for (id, tx) in targets {
            match tx.try_send(Arc::clone(&payload)) {
                Ok(()) => report.delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    report.failed += 1;
                    tracing::warn!(subscriber_id = %id, "Subscriber queue full, dropping message");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    report.failed += 1;
                    tracing::debug!(subscriber_id = %id, "Subscriber gone, pruning");
                    remove(&self.subscribers, id);
                }
            }
        }

        metrics::record_broadcast(&report);
        tracing::trace!(
            protocol = %envelope.protocol(),
            attempted = report.attempted,
            delivered = report.delivered,
            failed = report.failed,
            "Broadcast complete"
        );
        report
    }
}

fn remove(registry: &Registry, id: SubscriberId) -> bool {
    let removed = registry.remove(&id).is_some();
    if removed {
        metrics::set_subscribers(registry.len());
        tracing::debug!(subscriber_id = %id, "Subscriber deregistered");
    }
    removed
}

/// A registered subscriber's receiving end. Deregisters itself when dropped.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<Arc<str>>,
    registry: Arc<Registry>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next serialized envelope, or `None` once the hub has pruned this subscriber.
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        remove(&self.registry, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::envelope::Protocol;

    fn envelope(text: &str) -> Envelope {
        Envelope::new(Protocol::Stream, "127.0.0.1:5000".parse().unwrap(), text)
    }

    #[tokio::test]
    async fn every_subscriber_gets_each_broadcast() {
        let hub = Hub::new(8);
        let mut subs: Vec<_> = (0..3).map(|_| hub.subscribe()).collect();

        let report = hub.broadcast(&envelope("hello"));
        assert_eq!(report, BroadcastReport { attempted: 3, delivered: 3, failed: 0 });

        for sub in &mut subs {
            let json: serde_json::Value = serde_json::from_str(&sub.recv().await.unwrap()).unwrap();
            assert_eq!(json["data"], "hello");
            assert_eq!(json["protocol"], "Stream");
        }
    }

    #[tokio::test]
    async fn failed_subscriber_does_not_affect_others() {
        let hub = Hub::new(8);
        let mut subs: Vec<_> = (0..4).map(|_| hub.subscribe()).collect();
        subs[1].rx.close();

        let report = hub.broadcast(&envelope("one"));
        assert_eq!(report.attempted, 4);
        assert_eq!(report.delivered, 3);
        assert_eq!(report.failed, 1);
        assert_eq!(hub.subscriber_count(), 3);

        let report = hub.broadcast(&envelope("two"));
        assert_eq!(report, BroadcastReport { attempted: 3, delivered: 3, failed: 0 });

        for (i, sub) in subs.iter_mut().enumerate() {
            if i == 1 {
                continue;
            }
            assert!(sub.recv().await.unwrap().contains("\"one\""));
            assert!(sub.recv().await.unwrap().contains("\"two\""));
        }
    }

    #[tokio::test]
    async fn full_queue_only_drops_for_that_subscriber() {
        let hub = Hub::new(1);
        let mut slow = hub.subscribe();
        let mut fast = hub.subscribe();

        hub.broadcast(&envelope("a"));
        assert!(fast.recv().await.unwrap().contains("\"a\""));

        let report = hub.broadcast(&envelope("b"));
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(hub.subscriber_count(), 2);

        assert!(slow.recv().await.unwrap().contains("\"a\""));
        assert!(fast.recv().await.unwrap().contains("\"b\""));
    }

    #[tokio::test]
    async fn per_subscriber_order_is_submission_order() {
        let hub = Hub::new(16);
        let mut sub = hub.subscribe();
        for i in 0..10 {
            hub.broadcast(&envelope(&i.to_string()));
        }
        for i in 0..10 {
            let json: serde_json::Value = serde_json::from_str(&sub.recv().await.unwrap()).unwrap();
            assert_eq!(json["data"], i.to_string());
        }
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let hub = Hub::new(4);
        let sub = hub.subscribe();
        let id = sub.id();

        assert!(hub.unsubscribe(id));
        assert!(!hub.unsubscribe(id));
        drop(sub);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn dropping_subscription_deregisters() {
        let hub = Hub::new(4);
        let a = hub.subscribe();
        let _b = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);
        drop(a);
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[test]
    fn broadcast_without_subscribers_is_a_no_op() {
        let hub = Hub::new(4);
        assert_eq!(hub.broadcast(&envelope("nobody")), BroadcastReport::default());
    }
}
