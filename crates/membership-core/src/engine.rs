//! ProtocolEngine: one node's membership state machine.
//!
//! The host drives each node with two calls:
//!
//! 1. Deliver inbound datagrams (`deliver`, or `recv_loop` to pull them from
//!    the transport)
//! 2. Call `tick` once per logical time step
//!
//! Each tick the engine drains its inbox, handling join requests, join
//! replies and gossip. Once the node is a member it then advances its own
//! heartbeat, sweeps the table for stale peers, and gossips the live set.
//!
//! Phases: `Uninitialized → Joining → Member`, with `Failed` reachable from
//! any phase via `mark_failed` and never left. There is no join retry: if the
//! introducer never answers, the node stays in `Joining`.

use crate::Endpoint;
use crate::config::{ConfigError, ProtocolConfig};
use crate::events::{EventBus, MembershipEvent};
use crate::membership::{
    FailureDetector, FailureDetectorConfig, GossipDisseminator, MemberEntry, MembershipTable,
    MergeOutcome,
};
use crate::protocol::Message;
use crate::transport::Transport;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Node {0} is already started")]
    AlreadyStarted(Endpoint),

    #[error("Node {0} has failed")]
    Failed(Endpoint),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Lifecycle phase of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Constructed or torn down; not part of any group
    Uninitialized,
    /// Join request sent, waiting for the introducer's reply
    Joining,
    /// In the group: heartbeating, sweeping and gossiping
    Member,
    /// Marked failed by the host; does nothing further
    Failed,
}

/// Per-node state owned by exactly one engine.
#[derive(Debug, Clone)]
pub struct NodeState {
    local: Endpoint,
    heartbeat: i64,
    phase: Phase,
    table: MembershipTable,
}

impl NodeState {
    fn new(local: Endpoint) -> Self {
        Self {
            local,
            heartbeat: 0,
            phase: Phase::Uninitialized,
            table: MembershipTable::new(local),
        }
    }

    pub fn local(&self) -> Endpoint {
        self.local
    }

    pub fn heartbeat(&self) -> i64 {
        self.heartbeat
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn table(&self) -> &MembershipTable {
        &self.table
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Inbound messages decoded and handled
    pub handled: usize,
    /// Inbound messages dropped as undecodable
    pub dropped: usize,
    /// Peers evicted by the sweep
    pub removed: usize,
    /// Gossip sends accepted by the transport
    pub sent: usize,
}

/// Membership protocol state machine for one node.
pub struct ProtocolEngine {
    state: NodeState,
    detector: FailureDetector,
    gossip: GossipDisseminator,
    inbox: VecDeque<Vec<u8>>,
    events: Arc<EventBus>,
    rng: StdRng,
    introducer: Option<Endpoint>,
    now: i64,
}

impl ProtocolEngine {
    /// Create an uninitialized node.
    pub fn new(local: Endpoint, config: &ProtocolConfig, events: Arc<EventBus>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            state: NodeState::new(local),
            detector: FailureDetector::new(FailureDetectorConfig::try_from(config)?),
            gossip: GossipDisseminator::with_fanout(config.fanout),
            inbox: VecDeque::new(),
            events,
            rng: StdRng::seed_from_u64(rand::random()),
            introducer: None,
            now: 0,
        })
    }

    /// Make gossip ordering reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn local(&self) -> Endpoint {
        self.state.local
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn is_member(&self) -> bool {
        self.state.phase == Phase::Member
    }

    pub fn heartbeat(&self) -> i64 {
        self.state.heartbeat
    }

    pub fn table(&self) -> &MembershipTable {
        &self.state.table
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }

    /// Introducer passed to the last `start`; `None` after `leave`.
    pub fn introducer(&self) -> Option<Endpoint> {
        self.introducer
    }

    /// Tick most recently seen.
    pub fn now(&self) -> i64 {
        self.now
    }

    /// Datagrams waiting for the next tick.
    pub fn pending(&self) -> usize {
        self.inbox.len()
    }

    /// Peers currently left out of gossip but not yet evicted.
    pub fn suspected(&self) -> Vec<MemberEntry> {
        self.detector.suspected(&self.state.table, self.now)
    }

    /// Initialize the node and introduce it to the group.
    ///
    /// The introducer itself becomes a member immediately. Any other node
    /// sends a join request and waits in `Joining`; a lost request or reply
    /// is not retried.
    pub fn start(
        &mut self,
        introducer: Endpoint,
        transport: &mut dyn Transport,
        now: i64,
    ) -> Result<()> {
        match self.state.phase {
            Phase::Uninitialized => {}
            Phase::Failed => return Err(EngineError::Failed(self.local())),
            Phase::Joining | Phase::Member => return Err(EngineError::AlreadyStarted(self.local())),
        }

        let local = self.local();
        self.now = now;
        self.state.heartbeat = 0;
        self.state.table.clear();
        self.introducer = Some(introducer);

        if local == introducer {
            info!("{}: starting up group", local);
            self.state.phase = Phase::Member;
            self.events.emit(MembershipEvent::JoinedGroup {
                node: local,
                introducer,
                tick: now,
            });
            return Ok(());
        }

        info!("{}: trying to join via {}", local, introducer);
        let request = Message::join_request(local, self.state.heartbeat).encode();
        if let Err(e) = transport.send(local, introducer, &request) {
            warn!("{}: join request to {} failed: {}", local, introducer, e);
        }
        self.state.phase = Phase::Joining;
        Ok(())
    }

    /// Queue one inbound datagram for the next tick.
    pub fn deliver(&mut self, data: Vec<u8>) {
        if self.state.phase != Phase::Failed {
            self.inbox.push_back(data);
        }
    }

    /// Pull everything the transport holds for this node into the inbox.
    ///
    /// Returns false once the node has failed.
    pub fn recv_loop(&mut self, transport: &mut dyn Transport) -> bool {
        if self.state.phase == Phase::Failed {
            return false;
        }
        self.inbox.extend(transport.recv(self.local()));
        true
    }

    /// Run one protocol step at logical time `now`.
    pub fn tick(&mut self, now: i64, transport: &mut dyn Transport) -> TickReport {
        let mut report = TickReport::default();
        if self.state.phase == Phase::Failed {
            return report;
        }
        self.now = now;

        while let Some(data) = self.inbox.pop_front() {
            if self.handle(&data, transport) {
                report.handled += 1;
            } else {
                report.dropped += 1;
            }
        }

        if self.state.phase != Phase::Member {
            return report;
        }

        let local = self.local();
        self.state.heartbeat = self.state.heartbeat.max(now);

        let sweep = self.detector.detect(&mut self.state.table, now);
        for member in &sweep.removed {
            info!("{}: removed {} at tick {}", local, member, now);
            self.events.member_removed(local, *member, now);
        }
        report.removed = sweep.removed.len();

        if !sweep.live.is_empty() {
            report.sent = self.gossip.disseminate(
                local,
                self.state.heartbeat,
                &sweep.live,
                transport,
                &mut self.rng,
            );
        }

        report
    }

    /// Host-signalled failure. The node stops receiving, ticking and sending.
    pub fn mark_failed(&mut self) {
        if self.state.phase == Phase::Failed {
            return;
        }
        let local = self.local();
        info!("{}: marked failed at tick {}", local, self.now);
        self.state.phase = Phase::Failed;
        self.inbox.clear();
        self.events.emit(MembershipEvent::NodeFailed {
            node: local,
            tick: self.now,
        });
    }

    /// Leave the group and drop all membership state.
    ///
    /// A failed node stays failed.
    pub fn leave(&mut self) {
        self.state.table.clear();
        self.inbox.clear();
        self.introducer = None;
        if self.state.phase != Phase::Failed {
            self.state.phase = Phase::Uninitialized;
        }
        debug!("{}: left group", self.local());
    }

    /// Decode and dispatch one datagram. Returns false if it was dropped.
    fn handle(&mut self, data: &[u8], transport: &mut dyn Transport) -> bool {
        let local = self.local();
        let message = match Message::decode(data) {
            Ok(message) => message,
            Err(e) => {
                warn!("{}: dropping inbound message: {}", local, e);
                return false;
            }
        };

        match message {
            Message::JoinRequest {
                endpoint,
                heartbeat,
            } => self.on_join_request(endpoint, heartbeat, transport),
            Message::JoinReply { introducer } => self.on_join_reply(introducer),
            Message::Gossip { entries } => {
                if self.state.phase == Phase::Uninitialized {
                    debug!("{}: ignoring gossip before start", local);
                    return true;
                }
                for entry in entries {
                    self.merge(entry.endpoint, entry.heartbeat);
                }
            }
        }
        true
    }

    fn on_join_request(&mut self, endpoint: Endpoint, heartbeat: i64, transport: &mut dyn Transport) {
        let local = self.local();
        if self.state.phase != Phase::Member {
            debug!("{}: ignoring join request from {} while {:?}", local, endpoint, self.state.phase);
            return;
        }

        match self.merge(endpoint, heartbeat) {
            MergeOutcome::Local => return,
            MergeOutcome::Added => {}
            MergeOutcome::Updated | MergeOutcome::Stale => {
                debug!("{}: repeated join from {} treated as heartbeat", local, endpoint);
            }
        }

        let reply = Message::join_reply(local).encode();
        if let Err(e) = transport.send(local, endpoint, &reply) {
            warn!("{}: join reply to {} failed: {}", local, endpoint, e);
        }
    }

    fn on_join_reply(&mut self, introducer: Endpoint) {
        let local = self.local();
        if self.state.phase != Phase::Joining {
            debug!("{}: ignoring join reply from {} while {:?}", local, introducer, self.state.phase);
            return;
        }

        info!("{}: joined group via {} at tick {}", local, introducer, self.now);
        self.state.phase = Phase::Member;
        self.events.emit(MembershipEvent::JoinedGroup {
            node: local,
            introducer,
            tick: self.now,
        });
    }

    fn merge(&mut self, endpoint: Endpoint, heartbeat: i64) -> MergeOutcome {
        let outcome = self.state.table.merge_heartbeat(endpoint, heartbeat, self.now);
        if outcome.is_added() {
            info!("{}: added {} at tick {}", self.local(), endpoint, self.now);
            self.events.member_added(self.local(), endpoint, self.now);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::SimNetwork;
    use crate::protocol::{GossipEntry, RECORD_SIZE};
    use std::sync::Mutex;

    fn a() -> Endpoint {
        Endpoint::new(1, 0)
    }

    fn b() -> Endpoint {
        Endpoint::new(2, 0)
    }

    fn c() -> Endpoint {
        Endpoint::new(3, 0)
    }

    struct Harness {
        net: SimNetwork,
        events: Arc<EventBus>,
        log: Arc<Mutex<Vec<MembershipEvent>>>,
        _sub: crate::events::Subscription,
    }

    impl Harness {
        fn new() -> Self {
            let events = Arc::new(EventBus::new());
            let log = Arc::new(Mutex::new(Vec::new()));
            let log_clone = Arc::clone(&log);
            let sub = events.subscribe(move |event| log_clone.lock().unwrap().push(event));
            Self {
                net: SimNetwork::with_seed(1),
                events,
                log,
                _sub: sub,
            }
        }

        fn node(&self, local: Endpoint) -> ProtocolEngine {
            ProtocolEngine::new(local, &ProtocolConfig::default(), Arc::clone(&self.events))
                .unwrap()
                .with_seed(local.id() as u64)
        }

        fn step(&mut self, nodes: &mut [ProtocolEngine], now: i64) {
            for node in nodes.iter_mut() {
                node.recv_loop(&mut self.net);
                node.tick(now, &mut self.net);
            }
        }

        fn added(&self, observer: Endpoint, member: Endpoint) -> usize {
            self.log
                .lock()
                .unwrap()
                .iter()
                .filter(|e| {
                    matches!(e, MembershipEvent::MemberAdded { observer: o, member: m, .. }
                        if *o == observer && *m == member)
                })
                .count()
        }

        fn removed(&self, observer: Endpoint, member: Endpoint) -> usize {
            self.log
                .lock()
                .unwrap()
                .iter()
                .filter(|e| {
                    matches!(e, MembershipEvent::MemberRemoved { observer: o, member: m, .. }
                        if *o == observer && *m == member)
                })
                .count()
        }
    }

    // ==================== Startup ====================

    #[test]
    fn test_new_node_is_uninitialized() {
        let h = Harness::new();
        let node = h.node(a());
        assert_eq!(node.phase(), Phase::Uninitialized);
        assert_eq!(node.heartbeat(), 0);
        assert!(node.table().is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ProtocolConfig {
            t_fail: 10,
            t_remove: 5,
            fanout: None,
        };
        let result = ProtocolEngine::new(a(), &config, Arc::new(EventBus::new()));
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_introducer_bootstraps_group() {
        let mut h = Harness::new();
        let mut node = h.node(a());

        node.start(a(), &mut h.net, 0).unwrap();

        assert_eq!(node.phase(), Phase::Member);
        assert_eq!(h.net.stats().sent, 0);
        assert!(matches!(
            h.log.lock().unwrap()[0],
            MembershipEvent::JoinedGroup { node, .. } if node == a()
        ));
    }

    #[test]
    fn test_joiner_sends_join_request() {
        let mut h = Harness::new();
        let mut node = h.node(b());

        node.start(a(), &mut h.net, 5).unwrap();

        assert_eq!(node.phase(), Phase::Joining);
        assert_eq!(node.introducer(), Some(a()));
        let inbound = h.net.recv(a());
        assert_eq!(inbound.len(), 1);
        assert_eq!(Message::decode(&inbound[0]).unwrap(), Message::join_request(b(), 0));
    }

    #[test]
    fn test_start_twice_fails() {
        let mut h = Harness::new();
        let mut node = h.node(a());
        node.start(a(), &mut h.net, 0).unwrap();

        assert!(matches!(
            node.start(a(), &mut h.net, 1),
            Err(EngineError::AlreadyStarted(e)) if e == a()
        ));
    }

    // ==================== Join ====================

    #[test]
    fn test_join_example() {
        let mut h = Harness::new();
        let mut introducer = h.node(a());
        let mut joiner = h.node(b());
        introducer.start(a(), &mut h.net, 0).unwrap();

        // B asks to join at tick 5; A handles it in the same tick
        joiner.start(a(), &mut h.net, 5).unwrap();
        introducer.recv_loop(&mut h.net);
        introducer.tick(5, &mut h.net);

        assert_eq!(
            introducer.table().get(&b()),
            Some(&MemberEntry::new(b(), 0, 5))
        );
        assert_eq!(h.added(a(), b()), 1);

        // A replied, then gossiped its live set
        let inbound = h.net.recv(b());
        assert_eq!(inbound.len(), 2);
        assert_eq!(Message::decode(&inbound[0]).unwrap(), Message::join_reply(a()));
        assert_eq!(
            Message::decode(&inbound[1]).unwrap().entries()[0],
            GossipEntry::new(a(), 5)
        );

        // The reply alone makes B a member with an empty table
        joiner.deliver(inbound[0].clone());
        joiner.tick(6, &mut h.net);
        assert_eq!(joiner.phase(), Phase::Member);
        assert!(joiner.table().is_empty());

        // A's gossip fills it in
        joiner.deliver(inbound[1].clone());
        joiner.tick(7, &mut h.net);
        assert_eq!(joiner.table().get(&a()), Some(&MemberEntry::new(a(), 5, 7)));
        assert_eq!(h.added(b(), a()), 1);
    }

    #[test]
    fn test_join_request_ignored_unless_member() {
        let mut h = Harness::new();
        let mut joining = h.node(b());
        joining.start(a(), &mut h.net, 0).unwrap();
        h.net.recv(a());

        joining.deliver(Message::join_request(c(), 0).encode().to_vec());
        let report = joining.tick(1, &mut h.net);

        assert_eq!(report.handled, 1);
        assert!(joining.table().is_empty());
        assert_eq!(h.net.pending(&c()), 0);
    }

    #[test]
    fn test_duplicate_join_is_heartbeat_update() {
        let mut h = Harness::new();
        let mut introducer = h.node(a());
        introducer.start(a(), &mut h.net, 0).unwrap();

        introducer.deliver(Message::join_request(b(), 0).encode().to_vec());
        introducer.tick(1, &mut h.net);
        introducer.deliver(Message::join_request(b(), 4).encode().to_vec());
        introducer.tick(2, &mut h.net);

        assert_eq!(h.added(a(), b()), 1);
        assert_eq!(introducer.table().get(&b()), Some(&MemberEntry::new(b(), 4, 2)));

        // Both requests were answered
        let replies: Vec<_> = h
            .net
            .recv(b())
            .iter()
            .filter_map(|d| Message::decode(d).ok())
            .filter(|m| *m == Message::join_reply(a()))
            .collect();
        assert_eq!(replies.len(), 2);
    }

    #[test]
    fn test_join_reply_ignored_when_not_joining() {
        let mut h = Harness::new();
        let mut node = h.node(a());
        node.start(a(), &mut h.net, 0).unwrap();

        node.deliver(Message::join_reply(c()).encode().to_vec());
        node.tick(1, &mut h.net);

        assert_eq!(node.phase(), Phase::Member);
        let joins = h
            .log
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, MembershipEvent::JoinedGroup { .. }))
            .count();
        assert_eq!(joins, 1);
    }

    #[test]
    fn test_gossip_processed_while_joining() {
        let mut h = Harness::new();
        let mut node = h.node(b());
        node.start(a(), &mut h.net, 0).unwrap();

        node.deliver(
            Message::gossip(vec![GossipEntry::new(a(), 3), GossipEntry::new(c(), 2)])
                .encode()
                .to_vec(),
        );
        node.tick(3, &mut h.net);

        assert_eq!(node.phase(), Phase::Joining);
        assert_eq!(node.table().len(), 2);
        // Still joining: no heartbeat advance, no gossip
        assert_eq!(node.heartbeat(), 0);
        assert_eq!(h.net.pending(&a()), 1); // only the join request
    }

    #[test]
    fn test_gossip_ignored_before_start() {
        let mut h = Harness::new();
        let mut node = h.node(b());

        node.deliver(Message::gossip(vec![GossipEntry::new(a(), 3)]).encode().to_vec());
        let report = node.tick(1, &mut h.net);

        assert_eq!(report.handled, 1);
        assert!(node.table().is_empty());
        assert_eq!(node.phase(), Phase::Uninitialized);
    }

    #[test]
    fn test_gossip_about_self_not_stored() {
        let mut h = Harness::new();
        let mut node = h.node(a());
        node.start(a(), &mut h.net, 0).unwrap();

        node.deliver(
            Message::gossip(vec![GossipEntry::new(b(), 1), GossipEntry::new(a(), 99)])
                .encode()
                .to_vec(),
        );
        node.tick(1, &mut h.net);

        assert!(!node.table().contains(&a()));
        assert_eq!(node.heartbeat(), 1);
    }

    // ==================== Malformed input ====================

    #[test]
    fn test_malformed_gossip_dropped() {
        let mut h = Harness::new();
        let mut node = h.node(a());
        node.start(a(), &mut h.net, 0).unwrap();

        node.deliver(vec![2, 0, 0, 0, 0, 0, 0, 0]);
        node.deliver(vec![7]);
        node.deliver(vec![]);
        let report = node.tick(1, &mut h.net);

        assert_eq!(report.dropped, 3);
        assert_eq!(report.handled, 0);
        assert!(node.table().is_empty());
        assert_eq!(node.phase(), Phase::Member);
    }

    #[test]
    fn test_good_message_after_bad_still_handled() {
        let mut h = Harness::new();
        let mut node = h.node(a());
        node.start(a(), &mut h.net, 0).unwrap();

        node.deliver(vec![0; RECORD_SIZE - 1]);
        node.deliver(Message::gossip(vec![GossipEntry::new(b(), 1)]).encode().to_vec());
        let report = node.tick(1, &mut h.net);

        assert_eq!(report.dropped, 1);
        assert_eq!(report.handled, 1);
        assert!(node.table().contains(&b()));
    }

    // ==================== Ticking ====================

    #[test]
    fn test_member_heartbeat_follows_tick() {
        let mut h = Harness::new();
        let mut node = h.node(a());
        node.start(a(), &mut h.net, 0).unwrap();

        node.tick(4, &mut h.net);
        assert_eq!(node.heartbeat(), 4);
        node.tick(9, &mut h.net);
        assert_eq!(node.heartbeat(), 9);
    }

    #[test]
    fn test_no_gossip_with_empty_live_set() {
        let mut h = Harness::new();
        let mut node = h.node(a());
        node.start(a(), &mut h.net, 0).unwrap();

        let report = node.tick(1, &mut h.net);
        assert_eq!(report.sent, 0);
        assert_eq!(h.net.stats().sent, 0);
    }

    #[test]
    fn test_suspected_peer_not_gossiped() {
        let mut h = Harness::new();
        let mut node = h.node(a());
        node.start(a(), &mut h.net, 0).unwrap();
        node.deliver(Message::gossip(vec![GossipEntry::new(b(), 1)]).encode().to_vec());
        node.tick(10, &mut h.net);
        h.net.recv(b());

        // age 7: suspected
        let report = node.tick(17, &mut h.net);
        assert_eq!(report.sent, 0);
        assert_eq!(node.suspected().len(), 1);
        assert!(node.table().contains(&b()));

        // age 21: evicted
        let report = node.tick(31, &mut h.net);
        assert_eq!(report.removed, 1);
        assert!(node.table().is_empty());
        assert_eq!(h.removed(a(), b()), 1);
    }

    // ==================== Failure ====================

    #[test]
    fn test_failed_node_does_nothing() {
        let mut h = Harness::new();
        let mut node = h.node(a());
        node.start(a(), &mut h.net, 0).unwrap();
        node.deliver(Message::gossip(vec![GossipEntry::new(b(), 1)]).encode().to_vec());
        node.tick(1, &mut h.net);
        let sent_before = h.net.stats().sent;

        node.mark_failed();
        node.deliver(Message::gossip(vec![GossipEntry::new(c(), 1)]).encode().to_vec());
        h.net.send(b(), a(), &Message::join_reply(b()).encode()).unwrap();

        assert!(!node.recv_loop(&mut h.net));
        assert_eq!(node.pending(), 0);
        assert_eq!(node.tick(2, &mut h.net), TickReport::default());
        assert_eq!(h.net.stats().sent, sent_before + 1); // only our manual send
        assert!(!node.table().contains(&c()));
        assert!(matches!(
            node.start(a(), &mut h.net, 3),
            Err(EngineError::Failed(_))
        ));

        // Failed is absorbing
        node.leave();
        assert_eq!(node.phase(), Phase::Failed);
    }

    #[test]
    fn test_failed_peer_is_evicted() {
        let mut h = Harness::new();
        let mut nodes = vec![h.node(a()), h.node(b())];
        nodes[0].start(a(), &mut h.net, 0).unwrap();
        nodes[1].start(a(), &mut h.net, 0).unwrap();

        for now in 0..10 {
            h.step(&mut nodes, now);
        }
        assert!(nodes[0].table().contains(&b()));
        assert!(nodes[1].table().contains(&a()));

        nodes[1].mark_failed();
        for now in 10..40 {
            h.step(&mut nodes, now);
        }

        assert!(nodes[0].table().is_empty());
        assert_eq!(h.removed(a(), b()), 1);
        // The failed node never processed anything further
        assert_eq!(h.removed(b(), a()), 0);
        assert!(nodes[1].table().contains(&a()));
    }

    // ==================== Leave ====================

    #[test]
    fn test_leave_resets_node() {
        let mut h = Harness::new();
        let mut node = h.node(a());
        node.start(a(), &mut h.net, 0).unwrap();
        node.deliver(Message::gossip(vec![GossipEntry::new(b(), 1)]).encode().to_vec());
        node.tick(1, &mut h.net);

        node.leave();

        assert_eq!(node.phase(), Phase::Uninitialized);
        assert!(node.table().is_empty());
        assert_eq!(node.introducer(), None);
        assert_eq!(node.pending(), 0);
        assert!(node.start(a(), &mut h.net, 2).is_ok());
        assert_eq!(node.heartbeat(), 0);
    }

    // ==================== Convergence ====================

    #[test]
    fn test_convergence_reliable_network() {
        let mut h = Harness::new();
        let endpoints: Vec<_> = (1..=10).map(|id| Endpoint::new(id, 0)).collect();
        let mut nodes: Vec<_> = endpoints.iter().map(|e| h.node(*e)).collect();
        for node in nodes.iter_mut() {
            node.start(a(), &mut h.net, 0).unwrap();
        }

        let last = 10;
        for now in 0..=last {
            h.step(&mut nodes, now);
        }

        for node in &nodes {
            assert!(node.is_member());
            assert_eq!(node.table().len(), endpoints.len() - 1);
            for peer in endpoints.iter().filter(|e| **e != node.local()) {
                let entry = node.table().get(peer).unwrap();
                assert!(entry.heartbeat >= last - 1, "{} stale about {}", node.local(), peer);
            }
        }

        // Every node observed every other node exactly once
        for observer in &endpoints {
            for member in endpoints.iter().filter(|e| *e != observer) {
                assert_eq!(h.added(*observer, *member), 1);
            }
        }
    }
}
