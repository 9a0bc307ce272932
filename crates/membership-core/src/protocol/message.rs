//! Membership protocol message types.
//!
//! Three kinds travel between nodes: a join request to the introducer, the
//! introducer's reply, and the periodic gossip digest. See [`super::codec`]
//! for the byte layout.

use crate::Endpoint;

/// One `(endpoint, heartbeat)` record in a gossip digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GossipEntry {
    pub endpoint: Endpoint,
    pub heartbeat: i64,
}

impl GossipEntry {
    pub fn new(endpoint: Endpoint, heartbeat: i64) -> Self {
        Self {
            endpoint,
            heartbeat,
        }
    }
}

/// Message kind, matching the tag byte on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    JoinRequest = 0,
    JoinReply = 1,
    Gossip = 2,
}

impl MessageKind {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::JoinRequest),
            1 => Some(Self::JoinReply),
            2 => Some(Self::Gossip),
            _ => None,
        }
    }
}

/// Membership protocol messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Sent by a starting node to the introducer.
    JoinRequest {
        /// The joining node
        endpoint: Endpoint,
        /// Its heartbeat at the time of joining
        heartbeat: i64,
    },

    /// Introducer's acknowledgement. Carries no table; the new member
    /// converges through subsequent gossip.
    JoinReply {
        /// The introducer that accepted the join
        introducer: Endpoint,
    },

    /// Periodic digest: the sender's own heartbeat followed by its live peers.
    Gossip {
        /// Records in send order
        entries: Vec<GossipEntry>,
    },
}

impl Message {
    /// Create a join request.
    pub fn join_request(endpoint: Endpoint, heartbeat: i64) -> Self {
        Self::JoinRequest {
            endpoint,
            heartbeat,
        }
    }

    /// Create a join reply.
    pub fn join_reply(introducer: Endpoint) -> Self {
        Self::JoinReply { introducer }
    }

    /// Create a gossip digest.
    pub fn gossip(entries: Vec<GossipEntry>) -> Self {
        Self::Gossip { entries }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Self::JoinRequest { .. } => MessageKind::JoinRequest,
            Self::JoinReply { .. } => MessageKind::JoinReply,
            Self::Gossip { .. } => MessageKind::Gossip,
        }
    }

    /// Gossip records carried by this message (empty for join messages).
    pub fn entries(&self) -> &[GossipEntry] {
        match self {
            Self::Gossip { entries } => entries,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        assert_eq!(MessageKind::JoinRequest.tag(), 0);
        assert_eq!(MessageKind::JoinReply.tag(), 1);
        assert_eq!(MessageKind::Gossip.tag(), 2);
        assert_eq!(MessageKind::from_tag(2), Some(MessageKind::Gossip));
        assert_eq!(MessageKind::from_tag(3), None);
    }

    #[test]
    fn test_message_kind() {
        let a = Endpoint::new(1, 0);
        assert_eq!(Message::join_request(a, 0).kind(), MessageKind::JoinRequest);
        assert_eq!(Message::join_reply(a).kind(), MessageKind::JoinReply);
        assert_eq!(Message::gossip(vec![]).kind(), MessageKind::Gossip);
    }

    #[test]
    fn test_entries_extraction() {
        let entries = vec![
            GossipEntry::new(Endpoint::new(1, 0), 7),
            GossipEntry::new(Endpoint::new(2, 0), 3),
        ];
        let gossip = Message::gossip(entries.clone());
        assert_eq!(gossip.entries(), &entries[..]);

        // Join messages carry no records
        assert!(Message::join_reply(Endpoint::new(1, 0)).entries().is_empty());
    }
}
