//! Packet sources
//!
//! A packet source is the live traffic feed of one running node. It lives
//! exactly as long as the node does; the relay in [`crate::session`] is the
//! only component that reads from it.
//!
//! Cancellation is part of the contract: when the token passed to
//! [`PacketSource::watch`] fires, or the node shuts down, the returned stream
//! simply ends. Implementations must never surface cancellation as an error.

pub mod simulated;
pub mod watcher;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::hub::{Direction, TrafficEvent};

pub use simulated::{SimulatedLauncher, SimulatedNetwork, SimulatedNode, SimulationConfig};
pub use watcher::TrafficWatcher;

/// Live sequence of packets for one direction
///
/// `recv()` returns `None` once the watch is cancelled or the node is gone.
pub type PacketStream = mpsc::Receiver<TrafficEvent>;

/// Live traffic feed of a running node
pub trait PacketSource: Send + Sync + 'static {
    /// Watch packets flowing in `direction` until `cancel` fires
    fn watch(&self, direction: Direction, cancel: CancellationToken) -> PacketStream;
}
