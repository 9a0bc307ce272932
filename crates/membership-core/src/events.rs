//! Membership events for audit logging.
//!
//! The engine emits one `MemberAdded` per endpoint it first learns about and
//! one `MemberRemoved` per endpoint it evicts. Events are informational only;
//! nothing in the protocol reads them back.

use crate::Endpoint;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

/// Events observed by one node, tagged with that node's tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MembershipEvent {
    /// `observer` learned about `member` for the first time.
    MemberAdded {
        observer: Endpoint,
        member: Endpoint,
        tick: i64,
    },
    /// `observer` evicted `member` after it stayed silent past `t_remove`.
    MemberRemoved {
        observer: Endpoint,
        member: Endpoint,
        tick: i64,
    },
    /// `node` completed joining (or bootstrapped the group).
    JoinedGroup {
        node: Endpoint,
        introducer: Endpoint,
        tick: i64,
    },
    /// `node` was marked failed by its host.
    NodeFailed { node: Endpoint, tick: i64 },
}

impl MembershipEvent {
    /// The node that emitted this event.
    pub fn observer(&self) -> Endpoint {
        match self {
            Self::MemberAdded { observer, .. } | Self::MemberRemoved { observer, .. } => *observer,
            Self::JoinedGroup { node, .. } | Self::NodeFailed { node, .. } => *node,
        }
    }
}

/// Keeps a callback registered on an [`EventBus`]. Dropping it removes the
/// callback.
pub struct Subscription {
    bus: Weak<EventBus>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.id);
        }
    }
}

type Listener = Arc<dyn Fn(MembershipEvent) + Send + Sync>;

/// Fans membership events out to listeners, in registration order.
///
/// Shared behind an `Arc`; every node of a simulation may use the same bus.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<BTreeMap<u64, Listener>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` until the returned handle is dropped.
    pub fn subscribe(
        self: &Arc<Self>,
        listener: impl Fn(MembershipEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, Arc::new(listener));
        Subscription {
            bus: Arc::downgrade(self),
            id,
        }
    }

    fn remove(&self, id: u64) {
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Deliver `event` to every listener.
    ///
    /// Listeners run after the lock is released and may subscribe or
    /// unsubscribe.
    pub fn emit(&self, event: MembershipEvent) {
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();

        for listener in listeners {
            listener(event.clone());
        }
    }

    /// Record that `observer` added `member`.
    pub fn member_added(&self, observer: Endpoint, member: Endpoint, tick: i64) {
        self.emit(MembershipEvent::MemberAdded {
            observer,
            member,
            tick,
        });
    }

    /// Record that `observer` removed `member`.
    pub fn member_removed(&self, observer: Endpoint, member: Endpoint, tick: i64) {
        self.emit(MembershipEvent::MemberRemoved {
            observer,
            member,
            tick,
        });
    }
}
