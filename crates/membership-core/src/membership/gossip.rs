//! Gossip dissemination.
//!
//! Each round the node builds one digest, its own heartbeat followed by every
//! live peer, and sends that same digest to the live peers in a freshly
//! shuffled order. By default every live peer is a target; a fanout limit
//! keeps only the first `fanout` peers of the shuffled order.

use super::table::MemberEntry;
use crate::Endpoint;
use crate::protocol::{GossipEntry, Message};
use crate::transport::Transport;
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, warn};

/// Builds and sends membership digests.
#[derive(Debug, Clone, Default)]
pub struct GossipDisseminator {
    fanout: Option<usize>,
}

impl GossipDisseminator {
    /// Gossip to every live peer each round.
    pub fn new() -> Self {
        Self { fanout: None }
    }

    /// Gossip to at most `fanout` live peers each round (`None` = all).
    pub fn with_fanout(fanout: Option<usize>) -> Self {
        Self { fanout }
    }

    pub fn fanout(&self) -> Option<usize> {
        self.fanout
    }

    /// Build the digest for one round: ourselves first, then `live`.
    pub fn digest(&self, local: Endpoint, local_heartbeat: i64, live: &[MemberEntry]) -> Message {
        let entries = std::iter::once(GossipEntry::new(local, local_heartbeat))
            .chain(
                live.iter()
                    .map(|entry| GossipEntry::new(entry.endpoint, entry.heartbeat)),
            )
            .collect();
        Message::gossip(entries)
    }

    /// Send one round of gossip. Returns how many sends the transport accepted.
    ///
    /// Fire-and-forget: a failed send is logged and the round moves on.
    pub fn disseminate<R: Rng + ?Sized>(
        &self,
        local: Endpoint,
        local_heartbeat: i64,
        live: &[MemberEntry],
        transport: &mut dyn Transport,
        rng: &mut R,
    ) -> usize {
        if live.is_empty() {
            return 0;
        }

        let payload = self.digest(local, local_heartbeat, live).encode();

        let mut targets: Vec<Endpoint> = live.iter().map(|entry| entry.endpoint).collect();
        targets.shuffle(rng);
        if let Some(fanout) = self.fanout {
            targets.truncate(fanout);
        }

        let mut sent = 0;
        for target in &targets {
            match transport.send(local, *target, &payload) {
                Ok(()) => sent += 1,
                Err(e) => warn!("{}: gossip to {} failed: {}", local, target, e),
            }
        }

        debug!(
            "{}: gossiped {} entries to {}/{} peers",
            local,
            live.len() + 1,
            sent,
            targets.len()
        );
        sent
    }
}
