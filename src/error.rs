//! Error types
//!
//! Only hard failures live here. Soft conditions (a full subscriber queue,
//! starting a node that is already running) are reported through logs and
//! return values instead.

use std::io;

use thiserror::Error;

/// Errors returned by the traffic hub and its surroundings
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error (socket bind, accept)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The node failed to launch or shut down
    #[error("node error: {0}")]
    Node(String),

    /// The client transport cannot deliver records incrementally
    #[error("streaming unsupported by transport")]
    StreamingUnsupported,

    /// The client went away while a record was being written
    #[error("client disconnected")]
    Disconnected,

    /// Payload could not be serialized
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for hub operations
pub type Result<T> = std::result::Result<T, Error>;
