//! Subscription handle
//!
//! A `Subscription` is the read side of one subscriber's bounded queue. The hub
//! holds the only sender; the subscription is the only receiver.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::event::{Direction, TrafficEvent};
use super::store::BroadcastHub;

/// Identifier of a subscription, unique within one hub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(super) u64);

impl SubscriptionId {
    /// Raw numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// A registered subscriber's queue
///
/// Dropping the subscription unregisters it from its hub, so a reader that
/// goes away never leaves a queue behind.
pub struct Subscription {
    id: SubscriptionId,
    capacity: usize,
    rx: mpsc::Receiver<Arc<TrafficEvent>>,
    hub: Arc<BroadcastHub>,
    released: bool,
}

impl Subscription {
    pub(super) fn new(
        id: SubscriptionId,
        capacity: usize,
        rx: mpsc::Receiver<Arc<TrafficEvent>>,
        hub: Arc<BroadcastHub>,
    ) -> Self {
        Self {
            id,
            capacity,
            rx,
            hub,
            released: false,
        }
    }

    /// Subscription identifier
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Direction of the hub this subscription reads from
    pub fn direction(&self) -> Direction {
        self.hub.direction()
    }

    /// Maximum number of queued events
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of events currently queued
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Wait for the next event
    ///
    /// Returns `None` once the subscription has been removed from the hub and
    /// its queue is drained.
    pub async fn recv(&mut self) -> Option<Arc<TrafficEvent>> {
        self.rx.recv().await
    }

    /// Take the next queued event without waiting
    pub fn try_recv(&mut self) -> Option<Arc<TrafficEvent>> {
        self.rx.try_recv().ok()
    }

    /// Remove this subscription from the hub
    ///
    /// Returns `false` when the hub had already dropped it.
    pub fn unsubscribe(mut self) -> bool {
        self.release()
    }

    fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;
        self.rx.close();
        self.hub.unsubscribe(self.id)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("direction", &self.hub.direction())
            .field("capacity", &self.capacity)
            .field("queued", &self.rx.len())
            .finish()
    }
}
