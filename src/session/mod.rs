//! Node sessions
//!
//! A [`NodeSession`] starts and stops the observed node. Every run of the node
//! gets its own [`Relay`], which forwards the run's packet source into the
//! long-lived [`TrafficHub`](crate::hub::TrafficHub). Subscribers of the hub
//! never notice a restart beyond a gap in events.
//!
//! ```text
//!   start()                         stop()
//!     │                               │
//!     ▼                               ▼
//!  launcher.launch() ──► node      relay.detach()  (waits for listeners)
//!                         │           │
//!                         ▼           ▼
//!  Relay::attach(node.packet_source(), hub)   node.shutdown()
//! ```

pub mod node;
pub mod relay;
pub mod state;

pub use node::{NodeHandle, NodeLauncher};
pub use relay::{Relay, RelaySummary};
pub use state::{NodeSession, SessionPhase, Transition};
