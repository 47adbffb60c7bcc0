//! HTTP server of one node session
//!
//! | Route            | Purpose                                 |
//! |------------------|-----------------------------------------|
//! | `GET /sent`      | Server-sent events of outbound packets  |
//! | `GET /recv`      | Server-sent events of inbound packets   |
//! | `GET/POST /start`| Launch the node                         |
//! | `GET/POST /stop` | Shut the node down                      |
//! | `GET /stats`     | Hub and session counters                |
//!
//! Streams stay open across node restarts; only the client leaving or the
//! server shutting down ends them.

pub mod config;
pub mod handlers;
pub mod listener;

pub use config::ServerConfig;
pub use handlers::{ControlResponse, ControlStatus};
pub use listener::TrafficServer;
