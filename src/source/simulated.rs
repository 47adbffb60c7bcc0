//! Simulated nodes
//!
//! Stand-in for a real node: on every tick it sends a packet to the next peer
//! in its list. Nodes launched on the same [`SimulatedNetwork`] see each
//! other's packets, so a packet sent by one node shows up as inbound traffic
//! on its peer with the same packet id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::watcher::{TrafficWatcher, DEFAULT_WATCH_CAPACITY};
use super::PacketSource;
use crate::error::{Error, Result};
use crate::hub::TrafficEvent;
use crate::session::{NodeHandle, NodeLauncher};

/// Simulated node options
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Dial address of the node
    pub address: String,
    /// Addresses the node sends packets to, in round-robin order
    pub peers: Vec<String>,
    /// Time between two packets sent by the node
    pub interval: Duration,
    /// Queue size of each traffic watch
    pub watch_capacity: usize,
}

impl SimulationConfig {
    /// Create a config for a node at `address` with no peers
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            peers: Vec::new(),
            interval: Duration::from_millis(500),
            watch_capacity: DEFAULT_WATCH_CAPACITY,
        }
    }

    /// Set the peers packets are sent to
    pub fn peers<I, S>(mut self, peers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.peers = peers.into_iter().map(Into::into).collect();
        self
    }

    /// Set the send interval
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Address book shared by simulated nodes
#[derive(Debug, Default)]
pub struct SimulatedNetwork {
    nodes: RwLock<HashMap<String, TrafficWatcher>>,
}

impl SimulatedNetwork {
    /// Create an empty network
    pub fn new() -> Self {
        Self::default()
    }

    /// Addresses of the nodes currently up
    pub fn addresses(&self) -> Vec<String> {
        self.nodes.read().keys().cloned().collect()
    }

    /// Whether a node is up at `address`
    pub fn is_up(&self, address: &str) -> bool {
        self.nodes.read().contains_key(address)
    }

    fn join(&self, address: &str, watcher: TrafficWatcher) -> Result<()> {
        let mut nodes = self.nodes.write();
        if nodes.contains_key(address) {
            return Err(Error::Node(format!("address already in use: {}", address)));
        }
        nodes.insert(address.to_string(), watcher);
        Ok(())
    }

    fn leave(&self, address: &str) {
        self.nodes.write().remove(address);
    }

    /// Hand a packet to the node at `to`, if it is up
    fn deliver(&self, to: &str, event: TrafficEvent) -> bool {
        let watcher = self.nodes.read().get(to).cloned();
        match watcher {
            Some(watcher) => {
                watcher.notify(event);
                true
            }
            None => false,
        }
    }
}

/// Launches simulated nodes
pub struct SimulatedLauncher {
    config: SimulationConfig,
    network: Arc<SimulatedNetwork>,
    runs: AtomicU64,
}

impl SimulatedLauncher {
    /// Create a launcher for nodes on a private network
    pub fn new(config: SimulationConfig) -> Self {
        Self::on_network(config, Arc::new(SimulatedNetwork::new()))
    }

    /// Create a launcher for nodes on a shared network
    pub fn on_network(config: SimulationConfig, network: Arc<SimulatedNetwork>) -> Self {
        Self {
            config,
            network,
            runs: AtomicU64::new(0),
        }
    }

    /// Launcher configuration
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }
}

impl NodeLauncher for SimulatedLauncher {
    type Node = SimulatedNode;

    fn address(&self) -> &str {
        &self.config.address
    }

    async fn launch(&self) -> Result<SimulatedNode> {
        if self.config.interval.is_zero() {
            return Err(Error::InvalidConfig("send interval must be positive".into()));
        }

        let watcher = TrafficWatcher::with_capacity(self.config.watch_capacity);
        self.network.join(&self.config.address, watcher.clone())?;

        let run = self.runs.fetch_add(1, Ordering::Relaxed) + 1;
        let stop = CancellationToken::new();
        let generator = tokio::spawn(generate(
            self.config.clone(),
            run,
            watcher.clone(),
            Arc::clone(&self.network),
            stop.clone(),
        ));

        tracing::debug!(node = %self.config.address, run = run, "Simulated node up");

        Ok(SimulatedNode {
            address: self.config.address.clone(),
            watcher,
            network: Arc::clone(&self.network),
            stop,
            generator,
        })
    }
}

/// One run of a simulated node
pub struct SimulatedNode {
    address: String,
    watcher: TrafficWatcher,
    network: Arc<SimulatedNetwork>,
    stop: CancellationToken,
    generator: JoinHandle<()>,
}

impl SimulatedNode {
    /// Watcher the node reports its traffic to
    pub fn watcher(&self) -> &TrafficWatcher {
        &self.watcher
    }
}

impl NodeHandle for SimulatedNode {
    fn address(&self) -> &str {
        &self.address
    }

    fn packet_source(&self) -> Arc<dyn PacketSource> {
        Arc::new(self.watcher.clone())
    }

    async fn shutdown(self) -> Result<()> {
        self.stop.cancel();
        self.network.leave(&self.address);

        let joined = self.generator.await;
        self.watcher.close();

        joined.map_err(|e| Error::Node(format!("traffic generator failed: {}", e)))?;
        tracing::debug!(node = %self.address, "Simulated node down");
        Ok(())
    }
}

async fn generate(
    config: SimulationConfig,
    run: u64,
    watcher: TrafficWatcher,
    network: Arc<SimulatedNetwork>,
    stop: CancellationToken,
) {
    if config.peers.is_empty() {
        stop.cancelled().await;
        return;
    }

    // First packet one interval after launch, once the node is being watched
    let start = tokio::time::Instant::now() + config.interval;
    let mut ticker = tokio::time::interval_at(start, config.interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut seq = 0u64;

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                let peer = &config.peers[(seq as usize) % config.peers.len()];
                let packet_id = format!("{}/{}/{}", config.address, run, seq);
                let summary = Bytes::from(format!("ping #{} from {}", seq, config.address));

                watcher.notify(TrafficEvent::outbound(peer.clone(), summary.clone(), packet_id.clone()));
                network.deliver(peer, TrafficEvent::inbound(config.address.clone(), summary, packet_id));

                seq += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::{Direction, TrafficHub};
    use crate::session::NodeSession;

    fn config(address: &str, peer: &str) -> SimulationConfig {
        SimulationConfig::new(address)
            .peers([peer])
            .interval(Duration::from_millis(10))
    }

    #[tokio::test(start_paused = true)]
    async fn test_packets_reach_peer() {
        let network = Arc::new(SimulatedNetwork::new());
        let a = SimulatedLauncher::on_network(config("10.0.0.1:5000", "10.0.0.2:5000"), Arc::clone(&network));
        let b = SimulatedLauncher::on_network(config("10.0.0.2:5000", "10.0.0.1:5000"), Arc::clone(&network));

        let node_a = a.launch().await.unwrap();
        let node_b = b.launch().await.unwrap();

        let mut a_out = node_a.packet_source().watch(Direction::Outbound, CancellationToken::new());
        let mut b_in = node_b.packet_source().watch(Direction::Inbound, CancellationToken::new());

        let sent = a_out.recv().await.unwrap();
        let mut received = b_in.recv().await.unwrap();
        while received.peer_address != "10.0.0.1:5000" {
            received = b_in.recv().await.unwrap();
        }

        assert_eq!(sent.peer_address, "10.0.0.2:5000");
        assert_eq!(received.packet_id, sent.packet_id);
        assert_eq!(received.summary, sent.summary);

        node_a.shutdown().await.unwrap();
        node_b.shutdown().await.unwrap();
        assert!(network.addresses().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_ends_streams() {
        let launcher = SimulatedLauncher::new(config("10.0.0.1:5000", "10.0.0.2:5000"));
        let node = launcher.launch().await.unwrap();
        let mut outs = node.packet_source().watch(Direction::Outbound, CancellationToken::new());

        assert!(outs.recv().await.is_some());
        node.shutdown().await.unwrap();

        while outs.recv().await.is_some() {}
    }

    #[tokio::test]
    async fn test_address_in_use() {
        let network = Arc::new(SimulatedNetwork::new());
        let first = SimulatedLauncher::on_network(SimulationConfig::new("10.0.0.1:5000"), Arc::clone(&network));
        let second = SimulatedLauncher::on_network(SimulationConfig::new("10.0.0.1:5000"), Arc::clone(&network));

        let node = first.launch().await.unwrap();
        assert!(network.is_up("10.0.0.1:5000"));
        assert!(matches!(second.launch().await, Err(Error::Node(_))));

        node.shutdown().await.unwrap();
        assert!(!network.is_up("10.0.0.1:5000"));
        let node = second.launch().await.unwrap();
        node.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_relays_first_packet() {
        let hub = TrafficHub::new();
        let mut outs = hub.subscribe(Direction::Outbound);
        let launcher = SimulatedLauncher::new(
            SimulationConfig::new("10.0.0.1:5000")
                .peers(["10.0.0.2:5000"])
                .interval(Duration::from_secs(60)),
        );
        let session = NodeSession::new(launcher, hub);

        session.start().await.unwrap();
        let first = outs.recv().await.unwrap();
        assert_eq!(first.packet_id, "10.0.0.1:5000/1/0");

        session.stop().await.unwrap();
        session.start().await.unwrap();
        let first = outs.recv().await.unwrap();
        assert_eq!(first.packet_id, "10.0.0.1:5000/2/0");

        session.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_zero_interval_rejected() {
        let launcher = SimulatedLauncher::new(SimulationConfig::new("a").interval(Duration::ZERO));
        assert!(matches!(launcher.launch().await, Err(Error::InvalidConfig(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_packet_ids_unique_across_runs() {
        let launcher = SimulatedLauncher::new(config("10.0.0.1:5000", "10.0.0.9:5000"));

        let node = launcher.launch().await.unwrap();
        let mut outs = node.packet_source().watch(Direction::Outbound, CancellationToken::new());
        let first = outs.recv().await.unwrap();
        node.shutdown().await.unwrap();

        let node = launcher.launch().await.unwrap();
        let mut outs = node.packet_source().watch(Direction::Outbound, CancellationToken::new());
        let second = outs.recv().await.unwrap();
        node.shutdown().await.unwrap();

        assert_ne!(first.packet_id, second.packet_id);
    }
}
