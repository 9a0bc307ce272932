//! In-memory network for tests and simulations.
//!
//! Each endpoint gets its own FIFO queue. Sends may be dropped at a
//! configurable rate, and individual endpoints can be cut off to model a
//! crashed or partitioned node. The RNG is seedable so lossy runs replay
//! exactly.

use crate::Endpoint;
use crate::transport::{Result, Transport};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::trace;

/// Delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkStats {
    /// Datagrams handed to `send`
    pub sent: u64,
    /// Datagrams discarded by loss or isolation
    pub dropped: u64,
    /// Datagrams taken by `recv`
    pub delivered: u64,
}

/// Lossy in-memory datagram network.
pub struct SimNetwork {
    queues: HashMap<Endpoint, VecDeque<Vec<u8>>>,
    isolated: HashSet<Endpoint>,
    drop_rate: f64,
    rng: StdRng,
    stats: NetworkStats,
}

impl Default for SimNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl SimNetwork {
    /// A reliable network.
    pub fn new() -> Self {
        Self::with_seed(rand::random())
    }

    /// A reliable network whose loss decisions replay from `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            queues: HashMap::new(),
            isolated: HashSet::new(),
            drop_rate: 0.0,
            rng: StdRng::seed_from_u64(seed),
            stats: NetworkStats::default(),
        }
    }

    /// Drop each datagram with probability `rate` (clamped to `0.0..=1.0`).
    pub fn set_drop_rate(&mut self, rate: f64) {
        self.drop_rate = rate.clamp(0.0, 1.0);
    }

    pub fn drop_rate(&self) -> f64 {
        self.drop_rate
    }

    /// Discard all traffic to and from `endpoint`.
    pub fn isolate(&mut self, endpoint: Endpoint) {
        self.isolated.insert(endpoint);
        self.queues.remove(&endpoint);
    }

    /// Undo [`isolate`](Self::isolate).
    pub fn heal(&mut self, endpoint: Endpoint) {
        self.isolated.remove(&endpoint);
    }

    pub fn is_isolated(&self, endpoint: &Endpoint) -> bool {
        self.isolated.contains(endpoint)
    }

    /// Datagrams waiting for `endpoint`.
    pub fn pending(&self, endpoint: &Endpoint) -> usize {
        self.queues.get(endpoint).map(VecDeque::len).unwrap_or(0)
    }

    pub fn stats(&self) -> NetworkStats {
        self.stats
    }
}

impl Transport for SimNetwork {
    fn send(&mut self, from: Endpoint, to: Endpoint, data: &[u8]) -> Result<()> {
        self.stats.sent += 1;

        if self.isolated.contains(&from) || self.isolated.contains(&to) {
            self.stats.dropped += 1;
            trace!("Isolated: dropping {} -> {}", from, to);
            return Ok(());
        }

        if self.drop_rate > 0.0 && self.rng.random_bool(self.drop_rate) {
            self.stats.dropped += 1;
            trace!("Lost: {} -> {} ({} bytes)", from, to, data.len());
            return Ok(());
        }

        self.queues.entry(to).or_default().push_back(data.to_vec());
        Ok(())
    }

    fn recv(&mut self, at: Endpoint) -> Vec<Vec<u8>> {
        let received: Vec<_> = self
            .queues
            .get_mut(&at)
            .map(|queue| queue.drain(..).collect())
            .unwrap_or_default();
        self.stats.delivered += received.len() as u64;
        received
    }
}
