//! Broadcast hub for live traffic events
//!
//! The hub keeps a registry of subscribers per traffic direction and copies
//! each published event into every subscriber's bounded queue. It is owned by
//! nothing that restarts: node sessions and relays come and go, the hub and its
//! subscribers stay.
//!
//! # Architecture
//!
//! ```text
//!                            TrafficHub (clone = same hubs)
//!                     ┌──────────────────────────────────┐
//!                     │ inbound:  Arc<BroadcastHub>      │
//!                     │ outbound: Arc<BroadcastHub> {    │
//!                     │   subscribers: Mutex<HashMap<    │
//!                     │     SubscriptionId, mpsc::Tx>>   │
//!                     │ }                                │
//!                     └────────────────┬─────────────────┘
//!                                      │
//!         ┌────────────────────────────┼────────────────────────────┐
//!         │                            │                            │
//!         ▼                            ▼                            ▼
//!     [Relay]                   [Subscription]               [Subscription]
//!     hub.publish()             sub.recv()                   sub.recv()
//!         │                            │                            │
//!         └──► try_send (drop if full) ──► StreamBridge ──► HTTP client
//! ```
//!
//! # Backpressure
//!
//! Each subscription queue holds at most `subscription_capacity` events. When a
//! queue is full the new event is dropped for that subscriber only and a
//! warning is logged; the events already queued are kept.

pub mod config;
pub mod event;
pub mod store;
pub mod subscription;

pub use config::HubConfig;
pub use event::{Direction, TrafficEvent};
pub use store::{BroadcastHub, PublishReport, TrafficHub};
pub use subscription::{Subscription, SubscriptionId};
