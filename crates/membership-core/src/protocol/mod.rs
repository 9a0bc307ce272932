//! Wire protocol for node-to-node messages.
//!
//! - Message types (join request, join reply, gossip digest)
//! - Bit-exact little-endian binary codec

pub mod codec;
pub mod message;

pub use codec::{CodecError, HEADER_SIZE, RECORD_SIZE};
pub use message::{GossipEntry, Message, MessageKind};
