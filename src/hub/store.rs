//! Broadcast hub implementation
//!
//! The registry of subscribers for one traffic direction, and the pair of
//! hubs (inbound and outbound) that outlives every node restart.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};

use super::config::HubConfig;
use super::event::{Direction, TrafficEvent};
use super::subscription::{Subscription, SubscriptionId};
use crate::stats::HubStats;

/// Outcome of a single publish
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers that queued the event
    pub delivered: usize,
    /// Subscribers whose queue was full
    pub dropped: usize,
}

/// Fan-out registry for one traffic direction
///
/// The registry lock is only held while the subscriber map is read or
/// mutated. Delivery uses `try_send` on a snapshot of the senders, so publish
/// never waits on a subscriber.
pub struct BroadcastHub {
    /// Direction served by this hub
    direction: Direction,

    /// Registered subscribers, keyed by id
    subscribers: Mutex<HashMap<SubscriptionId, mpsc::Sender<Arc<TrafficEvent>>>>,

    /// Next subscription id
    next_id: AtomicU64,

    /// Configuration
    config: HubConfig,

    published: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl BroadcastHub {
    /// Create a hub with default configuration
    pub fn new(direction: Direction) -> Self {
        Self::with_config(direction, HubConfig::default())
    }

    /// Create a hub with custom configuration
    pub fn with_config(direction: Direction, mut config: HubConfig) -> Self {
        config.subscription_capacity = config.subscription_capacity.max(1);

        Self {
            direction,
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            config,
            published: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Direction served by this hub
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Get the hub configuration
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Register a new subscriber
    ///
    /// The subscriber sees every event published after this call returns.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let capacity = self.config.subscription_capacity;
        let (tx, rx) = mpsc::channel(capacity);
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));

        let count = {
            let mut subscribers = self.subscribers.lock();
            subscribers.insert(id, tx);
            subscribers.len()
        };

        tracing::debug!(
            direction = %self.direction,
            subscription = %id,
            capacity = capacity,
            subscribers = count,
            "Subscriber added"
        );

        Subscription::new(id, capacity, rx, Arc::clone(self))
    }

    /// Remove a subscriber
    ///
    /// Returns `true` if the subscriber was registered. Removing an unknown or
    /// already removed id is a no-op.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let (removed, count) = {
            let mut subscribers = self.subscribers.lock();
            let removed = subscribers.remove(&id).is_some();
            (removed, subscribers.len())
        };

        if removed {
            tracing::debug!(
                direction = %self.direction,
                subscription = %id,
                subscribers = count,
                "Subscriber removed"
            );
        }

        removed
    }

    /// Deliver an event to every registered subscriber
    ///
    /// A subscriber whose queue is full loses this event; the others are not
    /// affected. Never blocks and never fails.
    pub fn publish(&self, event: impl Into<Arc<TrafficEvent>>) -> PublishReport {
        let event = event.into();
        self.published.fetch_add(1, Ordering::Relaxed);

        let targets: Vec<(SubscriptionId, mpsc::Sender<Arc<TrafficEvent>>)> = self
            .subscribers
            .lock()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut report = PublishReport::default();
        let mut closed = Vec::new();

        for (id, tx) in targets {
            match tx.try_send(Arc::clone(&event)) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    report.dropped += 1;
                    tracing::warn!(
                        direction = %self.direction,
                        subscription = %id,
                        packet_id = %event.packet_id,
                        "Subscriber queue full, event dropped"
                    );
                }
                Err(TrySendError::Closed(_)) => closed.push(id),
            }
        }

        if !closed.is_empty() {
            let mut subscribers = self.subscribers.lock();
            for id in closed {
                subscribers.remove(&id);
            }
        }

        self.delivered
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.dropped.fetch_add(report.dropped as u64, Ordering::Relaxed);

        report
    }

    /// Number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Ids of the registered subscribers, in no particular order
    pub fn subscriber_ids(&self) -> Vec<SubscriptionId> {
        self.subscribers.lock().keys().copied().collect()
    }

    /// Whether `id` is currently registered
    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.subscribers.lock().contains_key(&id)
    }

    /// Snapshot of the hub counters
    pub fn stats(&self) -> HubStats {
        HubStats {
            subscribers: self.subscriber_count(),
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("direction", &self.direction)
            .field("subscribers", &self.subscriber_count())
            .field("config", &self.config)
            .finish()
    }
}

/// Inbound and outbound hubs of one node
///
/// Cheap to clone; every clone refers to the same two hubs.
#[derive(Debug, Clone)]
pub struct TrafficHub {
    inbound: Arc<BroadcastHub>,
    outbound: Arc<BroadcastHub>,
}

impl TrafficHub {
    /// Create both hubs with default configuration
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Create both hubs with the same configuration
    pub fn with_config(config: HubConfig) -> Self {
        Self {
            inbound: Arc::new(BroadcastHub::with_config(Direction::Inbound, config.clone())),
            outbound: Arc::new(BroadcastHub::with_config(Direction::Outbound, config)),
        }
    }

    /// Hub serving `direction`
    pub fn direction(&self, direction: Direction) -> &Arc<BroadcastHub> {
        match direction {
            Direction::Inbound => &self.inbound,
            Direction::Outbound => &self.outbound,
        }
    }

    /// Subscribe to one direction
    pub fn subscribe(&self, direction: Direction) -> Subscription {
        self.direction(direction).subscribe()
    }

    /// Publish an event on the hub matching its direction
    pub fn publish(&self, event: TrafficEvent) -> PublishReport {
        self.direction(event.direction).publish(event)
    }
}

impl Default for TrafficHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use bytes::Bytes;
    use tokio_test::{assert_pending, assert_ready, task};

    use super::*;

    fn event(id: &str) -> TrafficEvent {
        TrafficEvent::outbound("127.0.0.1:5001", Bytes::from_static(b"msg"), id)
    }

    fn hub(capacity: usize) -> Arc<BroadcastHub> {
        Arc::new(BroadcastHub::with_config(
            Direction::Outbound,
            HubConfig::default().subscription_capacity(capacity),
        ))
    }

    fn drain(sub: &mut Subscription) -> Vec<String> {
        let mut ids = Vec::new();
        while let Some(event) = sub.try_recv() {
            ids.push(event.packet_id.clone());
        }
        ids
    }

    #[tokio::test]
    async fn test_subscribe_receives_in_order() {
        let hub = hub(16);
        let mut sub = hub.subscribe();

        for id in ["a", "b", "c"] {
            let report = hub.publish(event(id));
            assert_eq!(report.delivered, 1);
        }

        assert_eq!(sub.recv().await.unwrap().packet_id, "a");
        assert_eq!(sub.recv().await.unwrap().packet_id, "b");
        assert_eq!(sub.recv().await.unwrap().packet_id, "c");
    }

    #[tokio::test]
    async fn test_only_events_after_subscribe() {
        let hub = hub(16);

        hub.publish(event("before"));
        let mut sub = hub.subscribe();
        hub.publish(event("after"));

        assert_eq!(drain(&mut sub), vec!["after"]);
    }

    #[tokio::test]
    async fn test_capacity_drop_keeps_oldest() {
        let hub = hub(3);
        let mut sub = hub.subscribe();

        let mut dropped = 0;
        for id in ["A", "B", "C", "D"] {
            dropped += hub.publish(event(id)).dropped;
        }
        assert_eq!(dropped, 1);
        assert_eq!(sub.len(), 3);

        // Still full: E is dropped as well
        let report = hub.publish(event("E"));
        assert_eq!(report.dropped, 1);
        assert_eq!(report.delivered, 0);

        assert_eq!(drain(&mut sub), vec!["A", "B", "C"]);

        // Reading freed space
        hub.publish(event("F"));
        assert_eq!(drain(&mut sub), vec!["F"]);
    }

    #[tokio::test]
    async fn test_overflow_k_plus_five() {
        let k = 4;
        let hub = hub(k);
        let mut sub = hub.subscribe();

        for i in 0..k + 5 {
            hub.publish(event(&i.to_string()));
        }

        let expected: Vec<String> = (0..k).map(|i| i.to_string()).collect();
        assert_eq!(drain(&mut sub), expected);

        let stats = hub.stats();
        assert_eq!(stats.published, (k + 5) as u64);
        assert_eq!(stats.delivered, k as u64);
        assert_eq!(stats.dropped, 5);
    }

    #[tokio::test]
    async fn test_slow_subscriber_does_not_affect_others() {
        let hub = hub(1);
        let mut slow = hub.subscribe();
        let mut fast = hub.subscribe();

        hub.publish(event("1"));
        assert_eq!(fast.try_recv().unwrap().packet_id, "1");

        let report = hub.publish(event("2"));
        assert_eq!(report, PublishReport { delivered: 1, dropped: 1 });
        assert_eq!(fast.try_recv().unwrap().packet_id, "2");
        assert_eq!(drain(&mut slow), vec!["1"]);
    }

    #[tokio::test]
    async fn test_unsubscribe_idempotent() {
        let hub = hub(4);
        let sub = hub.subscribe();
        let mut other = hub.subscribe();
        let id = sub.id();

        assert!(hub.unsubscribe(id));
        assert!(!hub.unsubscribe(id));

        // Handle-based release after the hub already dropped it
        assert!(!sub.unsubscribe());

        assert_eq!(hub.subscriber_count(), 1);
        hub.publish(event("x"));
        assert_eq!(drain(&mut other), vec!["x"]);
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let hub = hub(4);
        let sub = hub.subscribe();
        let id = sub.id();
        assert!(hub.contains(id));

        drop(sub);
        assert!(!hub.contains(id));
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_recv_ends_after_hub_removal() {
        let hub = hub(4);
        let mut sub = hub.subscribe();

        hub.publish(event("last"));
        hub.unsubscribe(sub.id());

        assert_eq!(sub.recv().await.unwrap().packet_id, "last");
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_recv_pending_until_publish() {
        let hub = hub(4);
        let mut sub = hub.subscribe();

        {
            let mut recv = task::spawn(sub.recv());
            assert_pending!(recv.poll());

            hub.publish(event("wake"));
            assert!(recv.is_woken());
            let received = assert_ready!(recv.poll());
            assert_eq!(received.unwrap().packet_id, "wake");
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let hub = hub(4);
        let report = hub.publish(event("nobody"));
        assert_eq!(report, PublishReport::default());
        assert_eq!(hub.stats().published, 1);
    }

    #[tokio::test]
    async fn test_traffic_hub_routes_by_direction() {
        let hub = TrafficHub::new();
        let mut inbound = hub.subscribe(Direction::Inbound);
        let mut outbound = hub.subscribe(Direction::Outbound);

        hub.publish(TrafficEvent::inbound("peer", Bytes::new(), "in-1"));
        hub.publish(TrafficEvent::outbound("peer", Bytes::new(), "out-1"));

        assert_eq!(drain(&mut inbound), vec!["in-1"]);
        assert_eq!(drain(&mut outbound), vec!["out-1"]);
        assert_eq!(inbound.direction(), Direction::Inbound);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_membership() {
        let hub = hub(8);

        let publishers: Vec<_> = (0..4)
            .map(|p| {
                let hub = Arc::clone(&hub);
                tokio::spawn(async move {
                    for i in 0..200 {
                        hub.publish(event(&format!("{p}-{i}")));
                        if i % 16 == 0 {
                            tokio::task::yield_now().await;
                        }
                    }
                })
            })
            .collect();

        // Each task subscribes 20 times and keeps every other subscription
        let churners: Vec<_> = (0..8)
            .map(|_| {
                let hub = Arc::clone(&hub);
                tokio::spawn(async move {
                    let mut kept = Vec::new();
                    for i in 0..20 {
                        let sub = hub.subscribe();
                        if i % 2 == 0 {
                            kept.push(sub);
                        } else {
                            assert!(sub.unsubscribe());
                        }
                        tokio::task::yield_now().await;
                    }
                    kept
                })
            })
            .collect();

        for handle in publishers {
            handle.await.unwrap();
        }

        let mut kept = Vec::new();
        for handle in churners {
            kept.extend(handle.await.unwrap());
        }

        assert_eq!(hub.subscriber_count(), 8 * 10);
        let ids: HashSet<_> = kept.iter().map(|s| s.id()).collect();
        assert_eq!(ids.len(), kept.len());
        assert!(ids.iter().all(|id| hub.contains(*id)));

        drop(kept);
        assert_eq!(hub.subscriber_count(), 0);
    }
}
