//! Binary wire codec.
//!
//! Layout (all integers little-endian):
//!
//! | message     | tag | payload                                        |
//! |-------------|-----|------------------------------------------------|
//! | JoinRequest | 0   | endpoint (4-byte id, 2-byte port) + i64 heartbeat |
//! | JoinReply   | 1   | endpoint                                       |
//! | Gossip      | 2   | repeated 14-byte `(endpoint, heartbeat)` records |
//!
//! Gossip carries no count field: the record count is `(len - 1) / 14` and the
//! payload must divide evenly. Lengths are validated before any field is read.

use super::message::{GossipEntry, Message, MessageKind};
use crate::Endpoint;
use crate::endpoint::ENDPOINT_WIRE_SIZE;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Tag byte.
pub const HEADER_SIZE: usize = 1;

/// One gossip record: endpoint + heartbeat.
pub const RECORD_SIZE: usize = ENDPOINT_WIRE_SIZE + 8;

const JOIN_REQUEST_SIZE: usize = HEADER_SIZE + RECORD_SIZE;
const JOIN_REPLY_SIZE: usize = HEADER_SIZE + ENDPOINT_WIRE_SIZE;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Malformed message ({len} bytes): {reason}")]
    Malformed { reason: &'static str, len: usize },

    #[error("Unknown message type: {0}")]
    UnknownType(u8),
}

pub type Result<T> = std::result::Result<T, CodecError>;

impl Message {
    /// Encode to wire bytes.
    pub fn encode(&self) -> Bytes {
        match self {
            Self::JoinRequest {
                endpoint,
                heartbeat,
            } => {
                let mut buf = BytesMut::with_capacity(JOIN_REQUEST_SIZE);
                buf.put_u8(MessageKind::JoinRequest.tag());
                put_record(&mut buf, *endpoint, *heartbeat);
                buf.freeze()
            }
            Self::JoinReply { introducer } => {
                let mut buf = BytesMut::with_capacity(JOIN_REPLY_SIZE);
                buf.put_u8(MessageKind::JoinReply.tag());
                put_endpoint(&mut buf, *introducer);
                buf.freeze()
            }
            Self::Gossip { entries } => {
                let mut buf = BytesMut::with_capacity(HEADER_SIZE + entries.len() * RECORD_SIZE);
                buf.put_u8(MessageKind::Gossip.tag());
                for entry in entries {
                    put_record(&mut buf, entry.endpoint, entry.heartbeat);
                }
                buf.freeze()
            }
        }
    }

    /// Decode from wire bytes.
    ///
    /// Bytes past the fixed payload of a join message are ignored.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let len = data.len();
        let mut buf = data;
        if !buf.has_remaining() {
            return Err(CodecError::Malformed {
                reason: "empty buffer",
                len,
            });
        }

        let tag = buf.get_u8();
        let kind = MessageKind::from_tag(tag).ok_or(CodecError::UnknownType(tag))?;

        match kind {
            MessageKind::JoinRequest => {
                if len < JOIN_REQUEST_SIZE {
                    return Err(CodecError::Malformed {
                        reason: "join request shorter than 15 bytes",
                        len,
                    });
                }
                let (endpoint, heartbeat) = get_record(&mut buf);
                Ok(Self::JoinRequest {
                    endpoint,
                    heartbeat,
                })
            }
            MessageKind::JoinReply => {
                if len < JOIN_REPLY_SIZE {
                    return Err(CodecError::Malformed {
                        reason: "join reply shorter than 7 bytes",
                        len,
                    });
                }
                Ok(Self::JoinReply {
                    introducer: get_endpoint(&mut buf),
                })
            }
            MessageKind::Gossip => {
                if buf.remaining() % RECORD_SIZE != 0 {
                    return Err(CodecError::Malformed {
                        reason: "gossip payload is not a whole number of records",
                        len,
                    });
                }
                let mut entries = Vec::with_capacity(buf.remaining() / RECORD_SIZE);
                while buf.has_remaining() {
                    let (endpoint, heartbeat) = get_record(&mut buf);
                    entries.push(GossipEntry::new(endpoint, heartbeat));
                }
                Ok(Self::Gossip { entries })
            }
        }
    }
}

fn put_endpoint(buf: &mut BytesMut, endpoint: Endpoint) {
    buf.put_u32_le(endpoint.id());
    buf.put_u16_le(endpoint.port());
}

fn put_record(buf: &mut BytesMut, endpoint: Endpoint, heartbeat: i64) {
    put_endpoint(buf, endpoint);
    buf.put_i64_le(heartbeat);
}

// Callers check the remaining length first; `Buf::get_*` panics on underflow.
fn get_endpoint(buf: &mut &[u8]) -> Endpoint {
    let id = buf.get_u32_le();
    let port = buf.get_u16_le();
    Endpoint::new(id, port)
}

fn get_record(buf: &mut &[u8]) -> (Endpoint, i64) {
    let endpoint = get_endpoint(buf);
    (endpoint, buf.get_i64_le())
}
