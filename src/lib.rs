//! Live packet traffic fan-out for restartable network nodes
//!
//! A node reports every packet it sends and receives to a [`source::PacketSource`].
//! While the node runs, a [`session::Relay`] forwards that traffic into a
//! [`TrafficHub`], which copies each event to every subscriber of the matching
//! direction. The [`server`] exposes the two directions as server-sent event
//! streams (`/sent`, `/recv`) next to `/start` and `/stop` controls.
//!
//! ```text
//!   node ──► PacketSource ──► Relay ──► TrafficHub ──► StreamBridge ──► client
//!            (per run)       (per run)  (long-lived)   (per client)
//! ```
//!
//! Subscribers outlive node restarts: stopping a node only detaches the relay,
//! and the next start attaches a new one to the same hub.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use traffic_hub::source::{SimulatedLauncher, SimulationConfig};
//! use traffic_hub::{NodeSession, ServerConfig, TrafficHub, TrafficServer};
//!
//! # async fn run() -> traffic_hub::Result<()> {
//! let launcher = SimulatedLauncher::new(SimulationConfig::new("127.0.0.1:5000"));
//! let session = Arc::new(NodeSession::new(launcher, TrafficHub::new()));
//! let server = TrafficServer::new(ServerConfig::default(), session);
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await
//! # }
//! ```

pub mod bridge;
pub mod cluster;
pub mod error;
pub mod hub;
pub mod server;
pub mod session;
pub mod source;
pub mod stats;

pub use bridge::{BridgeConfig, StreamBridge};
pub use cluster::{Cluster, ClusterConfig, ClusterManifest};
pub use error::{Error, Result};
pub use hub::{BroadcastHub, Direction, HubConfig, Subscription, TrafficEvent, TrafficHub};
pub use server::{ServerConfig, TrafficServer};
pub use session::{NodeHandle, NodeLauncher, NodeSession, SessionPhase, Transition};
pub use source::PacketSource;
pub use stats::{HubStats, NodeStats};
