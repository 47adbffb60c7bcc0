//! Relay from a node's packet source to the traffic hub
//!
//! The relay is the only component that knows both lifetimes: it reads the
//! packet source of one run of a node and publishes into the hub that outlives
//! every run.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::hub::{BroadcastHub, Direction, TrafficHub};
use crate::source::{PacketSource, PacketStream};

/// Packets forwarded by one relay, per direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelaySummary {
    /// Inbound packets published
    pub inbound: u64,
    /// Outbound packets published
    pub outbound: u64,
}

/// Link between one packet source and the hub
///
/// One listener task per direction. Detaching cancels the listeners and waits
/// for both to exit; the hub and its subscribers are left untouched.
pub struct Relay {
    cancel: CancellationToken,
    listeners: Vec<(Direction, JoinHandle<u64>)>,
}

impl Relay {
    /// Start forwarding `source` into `hub` until `cancel` fires
    ///
    /// Both directions are watched before this returns, so no packet the
    /// source emits afterwards is missed.
    pub fn attach(
        source: Arc<dyn PacketSource>,
        hub: TrafficHub,
        cancel: CancellationToken,
    ) -> Self {
        let listeners = Direction::ALL
            .into_iter()
            .map(|direction| {
                let packets = source.watch(direction, cancel.child_token());
                let hub = Arc::clone(hub.direction(direction));
                let handle = tokio::spawn(listen(packets, direction, hub, cancel.clone()));
                (direction, handle)
            })
            .collect();

        Self { cancel, listeners }
    }

    /// Whether every listener has exited
    pub fn is_finished(&self) -> bool {
        self.listeners.iter().all(|(_, handle)| handle.is_finished())
    }

    /// Cancel the listeners and wait for them to exit
    pub async fn detach(self) -> RelaySummary {
        self.cancel.cancel();

        let mut summary = RelaySummary::default();
        for (direction, handle) in self.listeners {
            let forwarded = match handle.await {
                Ok(forwarded) => forwarded,
                Err(e) => {
                    tracing::error!(direction = %direction, error = %e, "Relay listener failed");
                    0
                }
            };

            match direction {
                Direction::Inbound => summary.inbound = forwarded,
                Direction::Outbound => summary.outbound = forwarded,
            }
        }

        summary
    }
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("finished", &self.is_finished())
            .finish()
    }
}

async fn listen(
    mut packets: PacketStream,
    direction: Direction,
    hub: Arc<BroadcastHub>,
    cancel: CancellationToken,
) -> u64 {
    let mut forwarded = 0u64;

    tracing::debug!(direction = %direction, "Relay listener attached");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            packet = packets.recv() => match packet {
                Some(event) => {
                    hub.publish(event);
                    forwarded += 1;
                }
                None => {
                    tracing::debug!(direction = %direction, "Packet source ended");
                    break;
                }
            },
        }
    }

    tracing::debug!(direction = %direction, forwarded = forwarded, "Relay listener detached");
    forwarded
}
