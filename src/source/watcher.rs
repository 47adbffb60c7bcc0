//! In-node traffic watcher
//!
//! The node-side half of the packet source contract: the node calls
//! [`TrafficWatcher::notify`] for each packet it sends or receives, and every
//! active watch of that direction gets a copy in its own bounded queue.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

use super::{PacketSource, PacketStream};
use crate::hub::{Direction, TrafficEvent};

/// Queue size of each watch
pub const DEFAULT_WATCH_CAPACITY: usize = 10;

type Observers = Vec<(u64, mpsc::Sender<TrafficEvent>)>;

struct WatcherInner {
    inbound: Mutex<Observers>,
    outbound: Mutex<Observers>,
    capacity: usize,
    next_id: AtomicU64,
    closed: CancellationToken,
}

impl WatcherInner {
    fn observers(&self, direction: Direction) -> &Mutex<Observers> {
        match direction {
            Direction::Inbound => &self.inbound,
            Direction::Outbound => &self.outbound,
        }
    }

    fn remove(&self, direction: Direction, id: u64) {
        self.observers(direction).lock().retain(|(oid, _)| *oid != id);
    }
}

/// Observer list for the traffic of one node
///
/// Cheap to clone; clones share the same observers.
#[derive(Clone)]
pub struct TrafficWatcher {
    inner: Arc<WatcherInner>,
}

impl TrafficWatcher {
    /// Create a watcher with the default queue size
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_WATCH_CAPACITY)
    }

    /// Create a watcher whose watches queue up to `capacity` packets
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(WatcherInner {
                inbound: Mutex::new(Vec::new()),
                outbound: Mutex::new(Vec::new()),
                capacity: capacity.max(1),
                next_id: AtomicU64::new(1),
                closed: CancellationToken::new(),
            }),
        }
    }

    /// Hand a packet to every watch of its direction
    ///
    /// Returns the number of watches that queued it. A full watch loses the
    /// packet.
    pub fn notify(&self, event: TrafficEvent) -> usize {
        let direction = event.direction;
        let mut observers = self.inner.observers(direction).lock();
        let mut queued = 0;

        observers.retain(|(id, tx)| match tx.try_send(event.clone()) {
            Ok(()) => {
                queued += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(direction = %direction, watch = *id, "Watch channel full");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });

        queued
    }

    /// Number of active watches for `direction`
    pub fn watch_count(&self, direction: Direction) -> usize {
        self.inner.observers(direction).lock().len()
    }

    /// End every watch and refuse new ones
    ///
    /// Called when the node shuts down.
    pub fn close(&self) {
        self.inner.closed.cancel();
        self.inner.inbound.lock().clear();
        self.inner.outbound.lock().clear();
    }

    /// Whether the watcher has been closed
    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_cancelled()
    }
}

impl Default for TrafficWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TrafficWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrafficWatcher")
            .field("inbound", &self.watch_count(Direction::Inbound))
            .field("outbound", &self.watch_count(Direction::Outbound))
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl PacketSource for TrafficWatcher {
    fn watch(&self, direction: Direction, cancel: CancellationToken) -> PacketStream {
        let (tx, rx) = mpsc::channel(self.inner.capacity);

        if self.is_closed() || cancel.is_cancelled() {
            // Sender dropped here: the stream ends right away
            return rx;
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.observers(direction).lock().push((id, tx));

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = inner.closed.cancelled() => {}
            }
            inner.remove(direction, id);
            tracing::trace!(direction = %direction, watch = id, "Watch ended");
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn outbound(id: &str) -> TrafficEvent {
        TrafficEvent::outbound("127.0.0.1:5001", Bytes::new(), id)
    }

    #[tokio::test]
    async fn test_watch_receives_matching_direction() {
        let watcher = TrafficWatcher::new();
        let mut outs = watcher.watch(Direction::Outbound, CancellationToken::new());
        let mut ins = watcher.watch(Direction::Inbound, CancellationToken::new());

        assert_eq!(watcher.notify(outbound("p1")), 1);

        assert_eq!(outs.recv().await.unwrap().packet_id, "p1");
        assert!(ins.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_cancel_ends_stream() {
        let watcher = TrafficWatcher::new();
        let cancel = CancellationToken::new();
        let mut outs = watcher.watch(Direction::Outbound, cancel.clone());

        cancel.cancel();

        assert!(outs.recv().await.is_none());
        assert_eq!(watcher.watch_count(Direction::Outbound), 0);
    }

    #[tokio::test]
    async fn test_close_ends_all_streams() {
        let watcher = TrafficWatcher::new();
        let mut a = watcher.watch(Direction::Outbound, CancellationToken::new());
        let mut b = watcher.watch(Direction::Inbound, CancellationToken::new());

        watcher.close();

        assert!(a.recv().await.is_none());
        assert!(b.recv().await.is_none());
        assert!(watcher.is_closed());

        // Watching a closed node yields an empty stream
        let mut late = watcher.watch(Direction::Outbound, CancellationToken::new());
        assert!(late.recv().await.is_none());
        assert_eq!(watcher.notify(outbound("lost")), 0);
    }

    #[tokio::test]
    async fn test_full_watch_drops() {
        let watcher = TrafficWatcher::with_capacity(2);
        let mut outs = watcher.watch(Direction::Outbound, CancellationToken::new());

        assert_eq!(watcher.notify(outbound("1")), 1);
        assert_eq!(watcher.notify(outbound("2")), 1);
        assert_eq!(watcher.notify(outbound("3")), 0);

        assert_eq!(outs.recv().await.unwrap().packet_id, "1");
        assert_eq!(outs.recv().await.unwrap().packet_id, "2");
        assert!(outs.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dropped_stream_is_pruned() {
        let watcher = TrafficWatcher::new();
        let outs = watcher.watch(Direction::Outbound, CancellationToken::new());
        assert_eq!(watcher.watch_count(Direction::Outbound), 1);

        drop(outs);
        watcher.notify(outbound("x"));
        assert_eq!(watcher.watch_count(Direction::Outbound), 0);
    }
}
