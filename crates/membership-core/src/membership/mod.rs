//! Gossip-style group membership.
//!
//! # Protocol Overview
//!
//! **Membership table:**
//! - One row per known peer: highest heartbeat seen, local tick it last rose
//! - Merges keep the maximum heartbeat, so duplicated or reordered gossip is harmless
//!
//! **Failure detection:**
//! 1. A peer whose heartbeat has not risen for `t_fail` ticks is suspected
//! 2. Suspected peers stay in the table but are left out of gossip
//! 3. A peer silent for more than `t_remove` ticks is evicted
//!
//! **Dissemination:**
//! - Every tick, a member sends its own heartbeat plus all live peers
//! - The same digest goes to every live peer, in random order

pub mod failure;
pub mod gossip;
pub mod table;

pub use failure::{FailureDetector, FailureDetectorConfig};
pub use gossip::GossipDisseminator;
pub use table::{Liveness, MemberEntry, MembershipTable, MergeOutcome, Sweep};
