//! Local cluster harness
//!
//! Runs a handful of simulated nodes on one machine, each with its own
//! traffic server, and describes them in the manifest a dashboard loads:
//!
//! ```text
//! {"nodes":[{"id":"AA","addr":"127.0.0.1:5000","proxy":"http://127.0.0.1:4000"}, ...]}
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::net::TcpListener;

use crate::error::{Error, Result};
use crate::hub::{HubConfig, TrafficHub};
use crate::server::{ServerConfig, TrafficServer};
use crate::session::NodeSession;
use crate::source::{SimulatedLauncher, SimulatedNetwork, SimulationConfig};

/// Largest index with a two-letter id
pub const MAX_NODE_INDEX: i64 = 26 * 26 - 1;

/// Two-letter id of the node at `index` (`AA`, `AB`, ... `ZZ`)
///
/// Indices outside `0..=675` have no id and render as `UNDEFINED`.
pub fn node_id(index: i64) -> String {
    if !(0..=MAX_NODE_INDEX).contains(&index) {
        return "UNDEFINED".to_string();
    }

    let first = (b'A' + (index / 26) as u8) as char;
    let second = (b'A' + (index % 26) as u8) as char;
    [first, second].iter().collect()
}

/// Cluster configuration
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Number of nodes
    pub nodes: usize,
    /// Host the nodes and their servers listen on
    pub host: String,
    /// Port of the first node; node `i` uses `node_port_start + i`
    pub node_port_start: u16,
    /// Port of the first traffic server; node `i` uses `proxy_port_start + i`
    pub proxy_port_start: u16,
    /// Time between two packets sent by a node
    pub interval: Duration,
    /// Hub options shared by every node
    pub hub: HubConfig,
    /// Template for each traffic server (the bind address is overridden)
    pub server: ServerConfig,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            nodes: 3,
            host: "127.0.0.1".to_string(),
            node_port_start: 5000,
            proxy_port_start: 4000,
            interval: Duration::from_millis(500),
            hub: HubConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl ClusterConfig {
    /// Set the number of nodes
    pub fn nodes(mut self, nodes: usize) -> Self {
        self.nodes = nodes;
        self
    }

    /// Set the first node port
    pub fn node_port_start(mut self, port: u16) -> Self {
        self.node_port_start = port;
        self
    }

    /// Set the first traffic server port
    pub fn proxy_port_start(mut self, port: u16) -> Self {
        self.proxy_port_start = port;
        self
    }

    /// Set the send interval
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    fn port(start: u16, index: usize) -> Result<u16> {
        u16::try_from(start as usize + index)
            .map_err(|_| Error::InvalidConfig(format!("port {} + {} out of range", start, index)))
    }

    fn validate(&self) -> Result<()> {
        if self.nodes == 0 {
            return Err(Error::InvalidConfig("cluster needs at least one node".into()));
        }
        if self.nodes as i64 > MAX_NODE_INDEX + 1 {
            return Err(Error::InvalidConfig(format!(
                "at most {} nodes supported",
                MAX_NODE_INDEX + 1
            )));
        }
        Self::port(self.node_port_start, self.nodes - 1)?;
        Self::port(self.proxy_port_start, self.nodes - 1)?;
        Ok(())
    }
}

/// One entry of the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterNode {
    /// Two-letter node id
    pub id: String,
    /// Dial address of the node
    pub addr: String,
    /// Base URL of the node's traffic server
    pub proxy: String,
}

/// Description of a running cluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClusterManifest {
    /// Nodes in index order
    pub nodes: Vec<ClusterNode>,
}

impl ClusterManifest {
    /// Render as JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Simulated nodes sharing one network, each behind a traffic server
pub struct Cluster {
    servers: Vec<Arc<TrafficServer<SimulatedLauncher>>>,
    network: Arc<SimulatedNetwork>,
    manifest: ClusterManifest,
}

impl Cluster {
    /// Lay out the cluster; nothing is started or bound yet
    pub fn new(config: ClusterConfig) -> Result<Self> {
        config.validate()?;

        let addrs = (0..config.nodes)
            .map(|i| -> Result<String> {
                let port = ClusterConfig::port(config.node_port_start, i)?;
                Ok(format!("{}:{}", config.host, port))
            })
            .collect::<Result<Vec<_>>>()?;

        let network = Arc::new(SimulatedNetwork::new());
        let mut servers = Vec::with_capacity(config.nodes);
        let mut manifest = ClusterManifest::default();

        for (i, addr) in addrs.iter().enumerate() {
            let proxy_port = ClusterConfig::port(config.proxy_port_start, i)?;
            let bind_addr: SocketAddr = format!("{}:{}", config.host, proxy_port)
                .parse()
                .map_err(|_| Error::InvalidConfig(format!("invalid host: {}", config.host)))?;

            let peers = addrs.iter().filter(|peer| *peer != addr).cloned();
            let simulation = SimulationConfig::new(addr.clone())
                .peers(peers)
                .interval(config.interval);
            let launcher = SimulatedLauncher::on_network(simulation, Arc::clone(&network));

            let session = Arc::new(NodeSession::new(launcher, TrafficHub::with_config(config.hub.clone())));
            let server = TrafficServer::new(config.server.clone().bind(bind_addr), session);

            manifest.nodes.push(ClusterNode {
                id: node_id(i as i64),
                addr: addr.clone(),
                proxy: format!("http://{}", bind_addr),
            });
            servers.push(Arc::new(server));
        }

        Ok(Self {
            servers,
            network,
            manifest,
        })
    }

    /// Manifest describing every node
    pub fn manifest(&self) -> &ClusterManifest {
        &self.manifest
    }

    /// Traffic servers, in node order
    pub fn servers(&self) -> &[Arc<TrafficServer<SimulatedLauncher>>] {
        &self.servers
    }

    /// Network the nodes exchange packets on
    pub fn network(&self) -> &Arc<SimulatedNetwork> {
        &self.network
    }

    /// Start every node
    pub async fn start_all(&self) -> Result<()> {
        for server in &self.servers {
            server.session().start().await?;
        }
        Ok(())
    }

    /// Stop every node, returning the first failure
    pub async fn stop_all(&self) -> Result<()> {
        let mut first_error = None;
        for server in &self.servers {
            if let Err(e) = server.session().stop().await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Serve every node until `shutdown` completes, then stop them all
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut listeners = Vec::with_capacity(self.servers.len());
        for server in &self.servers {
            listeners.push(TcpListener::bind(server.bind_addr()).await?);
        }

        let tasks: Vec<_> = self
            .servers
            .iter()
            .zip(listeners)
            .map(|(server, listener)| {
                let server = Arc::clone(server);
                tokio::spawn(async move { server.serve(listener).await })
            })
            .collect();

        tracing::info!(nodes = self.servers.len(), "Cluster up");
        shutdown.await;
        tracing::info!("Shutting cluster down");

        for server in &self.servers {
            server.shutdown();
        }
        for task in tasks {
            match task.await {
                Ok(Err(e)) => tracing::error!(error = %e, "Traffic server failed"),
                Err(e) => tracing::error!(error = %e, "Traffic server task panicked"),
                Ok(Ok(())) => {}
            }
        }

        self.stop_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::Direction;

    #[test]
    fn test_node_ids() {
        assert_eq!(node_id(0), "AA");
        assert_eq!(node_id(1), "AB");
        assert_eq!(node_id(25), "AZ");
        assert_eq!(node_id(26), "BA");
        assert_eq!(node_id(675), "ZZ");
        assert_eq!(node_id(676), "UNDEFINED");
        assert_eq!(node_id(-1), "UNDEFINED");
    }

    #[test]
    fn test_manifest_layout() {
        let cluster = Cluster::new(ClusterConfig::default().nodes(2)).unwrap();

        assert_eq!(
            cluster.manifest().to_json().unwrap(),
            concat!(
                r#"{"nodes":["#,
                r#"{"id":"AA","addr":"127.0.0.1:5000","proxy":"http://127.0.0.1:4000"},"#,
                r#"{"id":"AB","addr":"127.0.0.1:5001","proxy":"http://127.0.0.1:4001"}"#,
                r#"]}"#
            )
        );
        assert_eq!(cluster.servers()[1].bind_addr().port(), 4001);
    }

    #[test]
    fn test_invalid_configs() {
        assert!(matches!(
            Cluster::new(ClusterConfig::default().nodes(0)),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            Cluster::new(ClusterConfig::default().nodes(2).proxy_port_start(u16::MAX)),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            Cluster::new(ClusterConfig::default().nodes(677)),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_nodes_see_each_other() {
        let cluster = Cluster::new(
            ClusterConfig::default()
                .nodes(2)
                .interval(Duration::from_millis(10)),
        )
        .unwrap();
        let mut inbound = cluster.servers()[1]
            .session()
            .hub()
            .subscribe(Direction::Inbound);

        cluster.start_all().await.unwrap();
        assert_eq!(cluster.network().addresses().len(), 2);

        let event = tokio::time::timeout(Duration::from_secs(5), inbound.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.peer_address, "127.0.0.1:5000");

        cluster.stop_all().await.unwrap();
        assert!(cluster.network().addresses().is_empty());
        assert!(cluster.servers().iter().all(|s| !s.session().is_running()));
    }

    #[tokio::test]
    async fn test_run_until_stops_nodes() {
        let cluster = Cluster::new(ClusterConfig::default().nodes(1).proxy_port_start(0)).unwrap();
        cluster.start_all().await.unwrap();

        cluster.run_until(async {}).await.unwrap();

        assert!(!cluster.servers()[0].session().is_running());
    }
}
