//! Node launcher contract
//!
//! The observed node (its consensus engine, networking and storage) is not
//! part of this crate. A session only needs to launch it, read its traffic,
//! and shut it down again.

use std::future::Future;
use std::sync::Arc;

use crate::error::Result;
use crate::source::PacketSource;

/// A running node
pub trait NodeHandle: Send + Sync + 'static {
    /// Dial address of the node
    fn address(&self) -> &str;

    /// Live traffic of this run of the node
    fn packet_source(&self) -> Arc<dyn PacketSource>;

    /// Stop the node
    ///
    /// Every stream handed out by the packet source must end once this
    /// returns.
    fn shutdown(self) -> impl Future<Output = Result<()>> + Send
    where
        Self: Sized;
}

/// Creates a fresh node on every session start
pub trait NodeLauncher: Send + Sync + 'static {
    /// Node type produced by this launcher
    type Node: NodeHandle;

    /// Address the launched nodes listen on
    fn address(&self) -> &str;

    /// Launch a new node
    fn launch(&self) -> impl Future<Output = Result<Self::Node>> + Send;
}
