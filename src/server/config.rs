//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::bridge::BridgeConfig;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Value of `Access-Control-Allow-Origin` on stream responses (None = header omitted)
    pub allow_origin: Option<String>,

    /// Interval between keep-alive comments on idle streams (None = disabled)
    pub keep_alive: Option<Duration>,

    /// Records that may sit between a bridge and its socket
    pub stream_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 4000)),
            allow_origin: Some("*".to_string()),
            keep_alive: Some(Duration::from_secs(15)),
            stream_buffer: 1,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the allowed CORS origin
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.allow_origin = Some(origin.into());
        self
    }

    /// Omit the CORS header
    pub fn disable_cors(mut self) -> Self {
        self.allow_origin = None;
        self
    }

    /// Set the keep-alive interval
    pub fn keep_alive(mut self, interval: Duration) -> Self {
        self.keep_alive = Some(interval);
        self
    }

    /// Disable keep-alive comments
    pub fn disable_keep_alive(mut self) -> Self {
        self.keep_alive = None;
        self
    }

    /// Bridge options derived from this config
    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            keep_alive: self.keep_alive,
        }
    }
}
