//! Node runtime for the sidewinder routing core.
//!
//! Hosts the [`sidewinder_routing::SnekRouter`] inside a single-task
//! event loop, owns the peer registry and the per-peer outbound queues,
//! and drives the one-second maintenance tick. All routing state lives in
//! the actor; the rest of the process talks to it through
//! [`NodeHandle`] events.
//!
//! - [`queue`] - bounded per-peer frame queue with a coalesced wakeup
//! - [`peer`] - peer handles and the registry
//! - [`node`] - the actor and its driver
//! - [`config`] - TOML configuration
//! - [`logging`] - tracing subscriber setup

pub mod config;
pub mod error;
pub mod logging;
pub mod node;
pub mod peer;
pub mod queue;

pub use config::NodeConfig;
pub use error::NodeError;
pub use node::{NodeEvent, NodeHandle, SnekNode, TreeRouterFn};
pub use peer::{Peer, PeerRegistry, LOCAL_PEER};
pub use queue::ProtoQueue;
