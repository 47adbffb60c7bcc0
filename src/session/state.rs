//! Node session state machine
//!
//! Tracks whether the observed node is running and owns the node handle and
//! the relay of the current run. The traffic hub is borrowed from outside and
//! survives every transition.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::node::{NodeHandle, NodeLauncher};
use super::relay::Relay;
use crate::error::Result;
use crate::hub::{Direction, TrafficHub};
use crate::stats::{NodeStats, SessionStats};

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    /// No node is running
    Stopped,
    /// A node is running and its traffic is relayed
    Running,
}

/// Result of a start or stop request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The node was launched
    Started,
    /// The node was shut down
    Stopped,
    /// Start requested while running; nothing changed
    AlreadyRunning,
    /// Stop requested while stopped; nothing changed
    AlreadyStopped,
}

impl Transition {
    /// Whether the request was a no-op
    pub fn is_warning(&self) -> bool {
        matches!(self, Transition::AlreadyRunning | Transition::AlreadyStopped)
    }

    /// Human readable description
    pub fn message(&self) -> &'static str {
        match self {
            Transition::Started => "node started",
            Transition::Stopped => "node stopped",
            Transition::AlreadyRunning => "node already started",
            Transition::AlreadyStopped => "node already stopped",
        }
    }
}

struct Run<N> {
    node: N,
    relay: Relay,
}

enum SessionState<N> {
    Stopped,
    Running(Run<N>),
}

/// Start/stop lifecycle of one node
///
/// Each start launches a fresh node and attaches a fresh relay to the shared
/// hub; each stop detaches the relay (waiting for its listeners) before the
/// node is shut down.
pub struct NodeSession<L: NodeLauncher> {
    launcher: L,
    hub: TrafficHub,
    state: Mutex<SessionState<L::Node>>,
    running: AtomicBool,
    started_at: parking_lot::Mutex<Option<Instant>>,
    starts: AtomicU64,
    stops: AtomicU64,
}

impl<L: NodeLauncher> NodeSession<L> {
    /// Create a stopped session publishing into `hub`
    pub fn new(launcher: L, hub: TrafficHub) -> Self {
        Self {
            launcher,
            hub,
            state: Mutex::new(SessionState::Stopped),
            running: AtomicBool::new(false),
            started_at: parking_lot::Mutex::new(None),
            starts: AtomicU64::new(0),
            stops: AtomicU64::new(0),
        }
    }

    /// The hub fed by this session
    pub fn hub(&self) -> &TrafficHub {
        &self.hub
    }

    /// Address of the node
    pub fn address(&self) -> &str {
        self.launcher.address()
    }

    /// Current phase
    pub fn phase(&self) -> SessionPhase {
        if self.running.load(Ordering::Acquire) {
            SessionPhase::Running
        } else {
            SessionPhase::Stopped
        }
    }

    /// Check if the node is running
    pub fn is_running(&self) -> bool {
        self.phase() == SessionPhase::Running
    }

    /// Launch the node and relay its traffic
    ///
    /// Starting a running session is a no-op reported as
    /// [`Transition::AlreadyRunning`]. A launch failure leaves the session
    /// stopped.
    pub async fn start(&self) -> Result<Transition> {
        let mut state = self.state.lock().await;

        if let SessionState::Running(_) = *state {
            tracing::warn!(node = %self.address(), "Node already started");
            return Ok(Transition::AlreadyRunning);
        }

        tracing::info!(node = %self.address(), "Starting node");

        let node = self.launcher.launch().await.inspect_err(|e| {
            tracing::error!(node = %self.address(), error = %e, "Node failed to start");
        })?;

        let relay = Relay::attach(node.packet_source(), self.hub.clone(), CancellationToken::new());

        *state = SessionState::Running(Run { node, relay });
        *self.started_at.lock() = Some(Instant::now());
        self.running.store(true, Ordering::Release);
        self.starts.fetch_add(1, Ordering::Relaxed);

        tracing::info!(node = %self.address(), "Node started");
        Ok(Transition::Started)
    }

    /// Stop relaying and shut the node down
    ///
    /// Stopping a stopped session is a no-op reported as
    /// [`Transition::AlreadyStopped`]. The session is stopped afterwards even
    /// when the node reports a shutdown error.
    pub async fn stop(&self) -> Result<Transition> {
        let mut state = self.state.lock().await;

        let run = match std::mem::replace(&mut *state, SessionState::Stopped) {
            SessionState::Stopped => {
                tracing::warn!(node = %self.address(), "Node already stopped");
                return Ok(Transition::AlreadyStopped);
            }
            SessionState::Running(run) => run,
        };

        tracing::info!(node = %self.address(), "Stopping node");

        self.running.store(false, Ordering::Release);
        *self.started_at.lock() = None;

        // Listeners must be gone before the source goes away
        let summary = run.relay.detach().await;
        tracing::debug!(
            node = %self.address(),
            inbound = summary.inbound,
            outbound = summary.outbound,
            "Relay detached"
        );

        // The run is over either way, so the stop counts even when shutdown fails
        self.stops.fetch_add(1, Ordering::Relaxed);

        run.node.shutdown().await.inspect_err(|e| {
            tracing::error!(node = %self.address(), error = %e, "Node failed to stop cleanly");
        })?;

        tracing::info!(node = %self.address(), "Node stopped");
        Ok(Transition::Stopped)
    }

    /// Lifecycle counters
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            phase: self.phase(),
            starts: self.starts.load(Ordering::Relaxed),
            stops: self.stops.load(Ordering::Relaxed),
            uptime: self.started_at.lock().map(|t| t.elapsed()),
        }
    }

    /// Lifecycle and hub counters
    pub fn node_stats(&self) -> NodeStats {
        NodeStats {
            address: self.address().to_string(),
            session: self.stats(),
            inbound: self.hub.direction(Direction::Inbound).stats(),
            outbound: self.hub.direction(Direction::Outbound).stats(),
        }
    }
}
