//! membership-daemon library: hosts for the membership protocol engine.
//!
//! Exposes the UDP node, the in-process simulation and their configuration
//! so integration tests can drive them directly.

pub mod audit;
pub mod config;
pub mod node;
pub mod simulation;
pub mod udp;

pub use audit::AuditLog;
pub use config::DaemonConfig;
pub use node::Node;
pub use simulation::{FailurePlan, Simulation, SimulationConfig, SimulationError, SimulationReport};
pub use udp::UdpTransport;
