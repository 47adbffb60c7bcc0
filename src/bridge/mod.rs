//! Stream bridge
//!
//! Adapts one hub subscription to one connected client. Each event is framed
//! as a server-sent event record and pushed to the client immediately; the
//! only buffering is the subscription's own bounded queue.
//!
//! The bridge owns its subscription for its whole run and releases it before
//! returning, whatever the reason for returning.

pub mod sink;
pub mod sse;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::hub::BroadcastHub;

pub use sink::{ChannelSink, EventSink};

/// Bridge options
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Interval between keep-alive comments (None = never)
    pub keep_alive: Option<Duration>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            keep_alive: Some(Duration::from_secs(15)),
        }
    }
}

/// Why a bridge stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeEnd {
    /// The client's request was cancelled
    ClientDisconnected,
    /// Writing to the client failed
    SinkClosed,
    /// The hub removed the subscription
    SubscriptionClosed,
}

/// Outcome of one client's stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeSummary {
    /// Event records written
    pub events_sent: u64,
    /// Reason the stream ended
    pub end: BridgeEnd,
}

/// Streams one direction of a hub to one client
#[derive(Debug, Clone)]
pub struct StreamBridge {
    hub: Arc<BroadcastHub>,
    config: BridgeConfig,
}

impl StreamBridge {
    /// Create a bridge for `hub`
    pub fn new(hub: Arc<BroadcastHub>, config: BridgeConfig) -> Self {
        Self { hub, config }
    }

    /// Fail unless `sink` can push records incrementally
    pub fn ensure_streaming<S: EventSink>(&self, sink: &S) -> Result<()> {
        if sink.supports_flush() {
            Ok(())
        } else {
            tracing::warn!(direction = %self.hub.direction(), "Streaming unsupported by transport");
            Err(Error::StreamingUnsupported)
        }
    }

    /// Stream events to `sink` until `disconnect` fires or the sink fails
    ///
    /// Returns [`Error::StreamingUnsupported`] without subscribing when the
    /// sink cannot flush.
    pub async fn run<S: EventSink>(
        &self,
        sink: &mut S,
        disconnect: CancellationToken,
    ) -> Result<BridgeSummary> {
        self.ensure_streaming(sink)?;

        let direction = self.hub.direction();
        let mut subscription = self.hub.subscribe();
        let id = subscription.id();
        let mut keep_alive = self
            .config
            .keep_alive
            .map(|period| interval_at(Instant::now() + period, period));
        let mut events_sent = 0u64;

        tracing::info!(direction = %direction, subscription = %id, "Stream client connected");

        let end = loop {
            tokio::select! {
                biased;
                _ = disconnect.cancelled() => break BridgeEnd::ClientDisconnected,
                event = subscription.recv() => {
                    let Some(event) = event else {
                        break BridgeEnd::SubscriptionClosed;
                    };
                    let record = sse::encode_event(&event)?;
                    if sink.send(record).await.is_err() {
                        break BridgeEnd::SinkClosed;
                    }
                    events_sent += 1;
                }
                _ = tick(&mut keep_alive) => {
                    if sink.send(sse::keep_alive()).await.is_err() {
                        break BridgeEnd::SinkClosed;
                    }
                }
            }
        };

        subscription.unsubscribe();

        tracing::info!(
            direction = %direction,
            subscription = %id,
            events_sent = events_sent,
            end = ?end,
            "Stream client disconnected"
        );

        Ok(BridgeSummary { events_sent, end })
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
