//! Transport trait for datagram delivery between nodes.
//!
//! Implementations:
//! - `SimNetwork` - In-memory, for tests and simulations
//! - `UdpTransport` (in membership-daemon) - tokio UDP socket
//!
//! Delivery is best-effort: messages may be dropped, duplicated or reordered,
//! and the protocol does not wait for acknowledgements. `send` must not block.

use crate::Endpoint;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Transport closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Unreliable datagram transport.
pub trait Transport {
    /// Queue `data` for delivery from `from` to `to`.
    fn send(&mut self, from: Endpoint, to: Endpoint, data: &[u8]) -> Result<()>;

    /// Take every datagram currently queued for `at`, oldest first.
    fn recv(&mut self, at: Endpoint) -> Vec<Vec<u8>>;
}
