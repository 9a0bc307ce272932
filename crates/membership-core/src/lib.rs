//! membership-core: gossip-style group membership with heartbeat failure detection.
//!
//! This crate provides:
//! - The binary wire codec for join and gossip messages
//! - A per-node membership table with heartbeat merging and expiry
//! - Failure detection and gossip dissemination over a pluggable transport
//! - The per-node protocol engine, driven by logical ticks
//!
//! The engine performs no I/O of its own. Hosts hand it a `Transport` (the
//! in-memory `SimNetwork`, or the UDP transport in membership-daemon) on
//! every call that needs one.

pub mod config;
pub mod endpoint;
pub mod engine;
pub mod events;
pub mod membership;
pub mod network;
pub mod protocol;
pub mod transport;

pub use config::{ConfigError, ProtocolConfig};
pub use endpoint::{Endpoint, EndpointError};
pub use engine::{EngineError, NodeState, Phase, ProtocolEngine, TickReport};
pub use events::{EventBus, MembershipEvent, Subscription};
pub use membership::{MemberEntry, MembershipTable};
pub use network::{NetworkStats, SimNetwork};
pub use protocol::{CodecError, GossipEntry, Message, MessageKind};
pub use transport::{Transport, TransportError};
