//! Membership table: the local view of the group.
//!
//! Tracks every known peer with the highest heartbeat it has reported and the
//! local tick at which that heartbeat last increased. The local node is never
//! stored here; its heartbeat lives in the engine's node state.

use crate::Endpoint;
use std::collections::BTreeMap;

/// One row of the membership table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberEntry {
    /// The peer this row describes
    pub endpoint: Endpoint,
    /// Highest heartbeat seen from the peer
    pub heartbeat: i64,
    /// Local tick at which `heartbeat` last increased
    pub last_updated: i64,
}

impl MemberEntry {
    pub fn new(endpoint: Endpoint, heartbeat: i64, last_updated: i64) -> Self {
        Self {
            endpoint,
            heartbeat,
            last_updated,
        }
    }

    /// Ticks since the heartbeat last increased.
    pub fn age(&self, now: i64) -> i64 {
        now.saturating_sub(self.last_updated)
    }

    /// Classify this entry against the suspicion and removal thresholds.
    pub fn liveness(&self, now: i64, t_fail: i64, t_remove: i64) -> Liveness {
        let age = self.age(now);
        if age > t_remove {
            Liveness::Expired
        } else if age < t_fail {
            Liveness::Live
        } else {
            Liveness::Suspected
        }
    }
}

/// Freshness of a table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Fresh enough to rebroadcast (`age < t_fail`)
    Live,
    /// Kept but not gossiped (`t_fail <= age <= t_remove`)
    Suspected,
    /// Due for eviction (`age > t_remove`)
    Expired,
}

/// Result of merging one heartbeat into the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// First time we hear of this endpoint
    Added,
    /// Heartbeat increased; freshness reset
    Updated,
    /// Heartbeat not newer than what we hold
    Stale,
    /// Update about ourselves
    Local,
}

impl MergeOutcome {
    pub fn is_added(self) -> bool {
        matches!(self, Self::Added)
    }

    pub fn is_changed(self) -> bool {
        matches!(self, Self::Added | Self::Updated)
    }
}

/// Output of a sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sweep {
    /// Entries fresh enough to gossip
    pub live: Vec<MemberEntry>,
    /// Endpoints evicted by this sweep
    pub removed: Vec<Endpoint>,
}

/// Mapping from endpoint to its latest known heartbeat.
#[derive(Debug, Clone)]
pub struct MembershipTable {
    local: Endpoint,
    entries: BTreeMap<Endpoint, MemberEntry>,
}

impl MembershipTable {
    /// Create an empty table for the given local endpoint.
    pub fn new(local: Endpoint) -> Self {
        Self {
            local,
            entries: BTreeMap::new(),
        }
    }

    pub fn local_endpoint(&self) -> Endpoint {
        self.local
    }

    /// Merge a heartbeat observed at local tick `now`.
    ///
    /// Inserts unknown endpoints, advances known ones only when the heartbeat
    /// is strictly newer, and ignores the local endpoint.
    pub fn merge_heartbeat(&mut self, endpoint: Endpoint, heartbeat: i64, now: i64) -> MergeOutcome {
        if endpoint == self.local {
            return MergeOutcome::Local;
        }

        match self.entries.get_mut(&endpoint) {
            Some(existing) if heartbeat > existing.heartbeat => {
                existing.heartbeat = heartbeat;
                existing.last_updated = now;
                MergeOutcome::Updated
            }
            Some(_) => MergeOutcome::Stale,
            None => {
                self.entries
                    .insert(endpoint, MemberEntry::new(endpoint, heartbeat, now));
                MergeOutcome::Added
            }
        }
    }

    /// Evict expired entries and collect the live ones.
    ///
    /// Classification happens in one pass over the table and eviction in a
    /// second, by key.
    pub fn sweep(&mut self, now: i64, t_fail: i64, t_remove: i64) -> Sweep {
        let mut sweep = Sweep::default();

        for entry in self.entries.values() {
            match entry.liveness(now, t_fail, t_remove) {
                Liveness::Live => sweep.live.push(*entry),
                Liveness::Suspected => {}
                Liveness::Expired => sweep.removed.push(entry.endpoint),
            }
        }

        for endpoint in &sweep.removed {
            self.entries.remove(endpoint);
        }

        sweep
    }

    /// Entries currently in the suspected band.
    pub fn suspected(&self, now: i64, t_fail: i64, t_remove: i64) -> Vec<MemberEntry> {
        self.entries
            .values()
            .filter(|e| e.liveness(now, t_fail, t_remove) == Liveness::Suspected)
            .copied()
            .collect()
    }

    pub fn get(&self, endpoint: &Endpoint) -> Option<&MemberEntry> {
        self.entries.get(endpoint)
    }

    pub fn contains(&self, endpoint: &Endpoint) -> bool {
        self.entries.contains_key(endpoint)
    }

    /// All entries, ordered by endpoint.
    pub fn entries(&self) -> impl Iterator<Item = &MemberEntry> {
        self.entries.values()
    }

    /// Known endpoints, sorted.
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.entries.keys().copied().collect()
    }

    /// Number of peers (excluding ourselves).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> Endpoint {
        Endpoint::new(1, 0)
    }

    fn peer_a() -> Endpoint {
        Endpoint::new(2, 0)
    }

    fn peer_b() -> Endpoint {
        Endpoint::new(3, 0)
    }

    fn peer_c() -> Endpoint {
        Endpoint::new(4, 0)
    }

    // ==================== Merge ====================

    #[test]
    fn test_merge_inserts_new_endpoint() {
        let mut table = MembershipTable::new(local());

        let outcome = table.merge_heartbeat(peer_a(), 3, 10);

        assert_eq!(outcome, MergeOutcome::Added);
        assert!(outcome.is_added());
        assert_eq!(table.get(&peer_a()), Some(&MemberEntry::new(peer_a(), 3, 10)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_merge_newer_heartbeat_updates_both_fields() {
        let mut table = MembershipTable::new(local());
        table.merge_heartbeat(peer_a(), 3, 10);

        let outcome = table.merge_heartbeat(peer_a(), 4, 12);

        assert_eq!(outcome, MergeOutcome::Updated);
        assert_eq!(table.get(&peer_a()), Some(&MemberEntry::new(peer_a(), 4, 12)));
    }

    #[test]
    fn test_merge_stale_heartbeat_is_noop() {
        let mut table = MembershipTable::new(local());
        table.merge_heartbeat(peer_a(), 8, 10);

        assert_eq!(table.merge_heartbeat(peer_a(), 8, 15), MergeOutcome::Stale);
        assert_eq!(table.merge_heartbeat(peer_a(), 2, 16), MergeOutcome::Stale);

        // Freshness is not refreshed by stale updates
        assert_eq!(table.get(&peer_a()), Some(&MemberEntry::new(peer_a(), 8, 10)));
    }

    #[test]
    fn test_merge_ignores_local_endpoint() {
        let mut table = MembershipTable::new(local());

        assert_eq!(table.merge_heartbeat(local(), 100, 1), MergeOutcome::Local);
        assert!(table.is_empty());
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut once = MembershipTable::new(local());
        once.merge_heartbeat(peer_a(), 5, 7);

        let mut twice = MembershipTable::new(local());
        twice.merge_heartbeat(peer_a(), 5, 7);
        twice.merge_heartbeat(peer_a(), 5, 7);

        assert_eq!(once.get(&peer_a()), twice.get(&peer_a()));
        assert_eq!(once.len(), twice.len());
    }

    #[test]
    fn test_heartbeat_is_max_of_interleaved_stream() {
        let mut table = MembershipTable::new(local());
        let stream = [
            (peer_a(), 3),
            (peer_b(), 9),
            (peer_a(), 7),
            (peer_b(), 2),
            (peer_a(), 1),
            (peer_c(), 4),
            (peer_a(), 6),
            (peer_b(), 11),
        ];

        for (now, (endpoint, heartbeat)) in stream.into_iter().enumerate() {
            table.merge_heartbeat(endpoint, heartbeat, now as i64);
        }

        assert_eq!(table.get(&peer_a()).unwrap().heartbeat, 7);
        assert_eq!(table.get(&peer_b()).unwrap().heartbeat, 11);
        assert_eq!(table.get(&peer_c()).unwrap().heartbeat, 4);
        // last_updated follows the last increase, not the last message
        assert_eq!(table.get(&peer_a()).unwrap().last_updated, 2);
    }

    // ==================== Sweep ====================

    #[test]
    fn test_liveness_bands() {
        let entry = MemberEntry::new(peer_a(), 0, 10);

        assert_eq!(entry.liveness(12, 5, 20), Liveness::Live);
        assert_eq!(entry.liveness(15, 5, 20), Liveness::Suspected); // age == t_fail
        assert_eq!(entry.liveness(30, 5, 20), Liveness::Suspected); // age == t_remove
        assert_eq!(entry.liveness(31, 5, 20), Liveness::Expired);
    }

    #[test]
    fn test_sweep_removal_timeline() {
        let mut table = MembershipTable::new(local());
        table.merge_heartbeat(peer_a(), 1, 10);

        // age 2: live
        let sweep = table.sweep(12, 5, 20);
        assert_eq!(sweep.live, vec![MemberEntry::new(peer_a(), 1, 10)]);
        assert!(sweep.removed.is_empty());

        // age 7: suspected, still in the table
        let sweep = table.sweep(17, 5, 20);
        assert!(sweep.live.is_empty());
        assert!(sweep.removed.is_empty());
        assert!(table.contains(&peer_a()));

        // age 21: evicted
        let sweep = table.sweep(31, 5, 20);
        assert!(sweep.live.is_empty());
        assert_eq!(sweep.removed, vec![peer_a()]);
        assert!(!table.contains(&peer_a()));
    }

    #[test]
    fn test_sweep_mixed_table() {
        let mut table = MembershipTable::new(local());
        table.merge_heartbeat(peer_a(), 1, 100); // age 0
        table.merge_heartbeat(peer_b(), 1, 90); // age 10
        table.merge_heartbeat(peer_c(), 1, 50); // age 50

        let sweep = table.sweep(100, 5, 20);

        assert_eq!(sweep.live.len(), 1);
        assert_eq!(sweep.live[0].endpoint, peer_a());
        assert_eq!(sweep.removed, vec![peer_c()]);
        assert_eq!(table.endpoints(), vec![peer_a(), peer_b()]);
        assert_eq!(table.suspected(100, 5, 20)[0].endpoint, peer_b());
    }

    #[test]
    fn test_sweep_removes_many_entries() {
        let mut table = MembershipTable::new(local());
        for id in 2..50 {
            table.merge_heartbeat(Endpoint::new(id, 0), 0, 0);
        }
        table.merge_heartbeat(Endpoint::new(99, 0), 0, 100);

        let sweep = table.sweep(100, 5, 20);

        assert_eq!(sweep.removed.len(), 48);
        assert_eq!(table.len(), 1);
        assert!(table.contains(&Endpoint::new(99, 0)));
    }

    #[test]
    fn test_clear() {
        let mut table = MembershipTable::new(local());
        table.merge_heartbeat(peer_a(), 1, 1);
        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.local_endpoint(), local());
    }
}
