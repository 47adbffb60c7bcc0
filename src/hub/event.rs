//! Traffic event types
//!
//! This module defines the direction of a packet relative to the observed node
//! and the immutable event that is fanned out to subscribers.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

/// Direction of a packet relative to the observed node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Packet received by the node
    Inbound,
    /// Packet sent by the node
    Outbound,
}

impl Direction {
    /// Both directions, inbound first
    pub const ALL: [Direction; 2] = [Direction::Inbound, Direction::Outbound];

    /// Short label used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbound => "in",
            Direction::Outbound => "out",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A packet observed on a node
///
/// Events are immutable once built and are shared between subscribers behind
/// an `Arc`; the summary uses `Bytes` so cloning never copies the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficEvent {
    /// Whether the node sent or received the packet
    pub direction: Direction,
    /// Dial address of the remote peer
    pub peer_address: String,
    /// Opaque summary of the packet payload
    pub summary: Bytes,
    /// Identifier of the packet, shared by the sender and receiver sides
    pub packet_id: String,
    /// Capture time in microseconds since the Unix epoch
    pub timestamp_micros: u64,
}

impl TrafficEvent {
    /// Create an inbound event stamped with the current time
    pub fn inbound(
        peer_address: impl Into<String>,
        summary: Bytes,
        packet_id: impl Into<String>,
    ) -> Self {
        Self::new(Direction::Inbound, peer_address, summary, packet_id)
    }

    /// Create an outbound event stamped with the current time
    pub fn outbound(
        peer_address: impl Into<String>,
        summary: Bytes,
        packet_id: impl Into<String>,
    ) -> Self {
        Self::new(Direction::Outbound, peer_address, summary, packet_id)
    }

    /// Create an event stamped with the current time
    pub fn new(
        direction: Direction,
        peer_address: impl Into<String>,
        summary: Bytes,
        packet_id: impl Into<String>,
    ) -> Self {
        Self {
            direction,
            peer_address: peer_address.into(),
            summary,
            packet_id: packet_id.into(),
            timestamp_micros: now_micros(),
        }
    }

    /// Override the capture timestamp
    pub fn at(mut self, timestamp_micros: u64) -> Self {
        self.timestamp_micros = timestamp_micros;
        self
    }

    /// Payload summary as text, replacing invalid UTF-8
    pub fn summary_text(&self) -> String {
        String::from_utf8_lossy(&self.summary).into_owned()
    }
}

/// Current wall-clock time in microseconds since the Unix epoch
pub fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}
