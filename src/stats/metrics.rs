//! Statistics for hubs and node sessions

use std::time::Duration;

use serde::Serialize;

use crate::session::SessionPhase;

/// Counters of one broadcast hub
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HubStats {
    /// Currently registered subscribers
    pub subscribers: usize,
    /// Events published since the hub was created
    pub published: u64,
    /// Event copies queued to subscribers
    pub delivered: u64,
    /// Event copies dropped because a queue was full
    pub dropped: u64,
}

impl HubStats {
    /// Fraction of event copies that were dropped (0.0 when nothing was sent)
    pub fn drop_ratio(&self) -> f64 {
        let total = self.delivered + self.dropped;
        if total > 0 {
            self.dropped as f64 / total as f64
        } else {
            0.0
        }
    }
}

/// Lifecycle counters of a node session
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    /// Current phase
    pub phase: SessionPhase,
    /// Successful starts
    pub starts: u64,
    /// Stops, including those whose node shutdown reported an error
    pub stops: u64,
    /// Time since the current run started
    #[serde(rename = "uptime_ms", serialize_with = "serialize_uptime")]
    pub uptime: Option<Duration>,
}

fn serialize_uptime<S>(uptime: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match uptime {
        Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
        None => serializer.serialize_none(),
    }
}

/// Everything reported for one node
#[derive(Debug, Clone, Serialize)]
pub struct NodeStats {
    /// Dial address of the node
    pub address: String,
    /// Session lifecycle
    pub session: SessionStats,
    /// Inbound hub
    pub inbound: HubStats,
    /// Outbound hub
    pub outbound: HubStats,
}
