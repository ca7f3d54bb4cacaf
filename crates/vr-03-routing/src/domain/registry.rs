//! Subscription registry.
//!
//! Holds weak references to the sessions that receive forwarded events. The
//! registry never keeps a session alive: an entry whose link has been dropped
//! or has reached a terminal state is skipped and pruned.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use shared_types::{SessionId, SubscriberLink};
use tracing::debug;
use vr_telemetry::SUBSCRIBERS_REGISTERED;

use crate::ports::EventFilter;

/// Consecutive failed submissions after which a subscriber is dropped.
pub const DEFAULT_MAX_SEND_FAILURES: u32 = 3;

struct Subscription {
    link: Weak<dyn SubscriberLink>,
    since: DateTime<Utc>,
    filter: Option<Arc<dyn EventFilter>>,
    send_failures: u32,
}

/// A registered subscriber that was still live when the snapshot was taken.
#[derive(Clone)]
pub struct ActiveSubscriber {
    pub link: Arc<dyn SubscriberLink>,
    pub since: DateTime<Utc>,
    pub filter: Option<Arc<dyn EventFilter>>,
}

impl ActiveSubscriber {
    pub fn session_id(&self) -> SessionId {
        self.link.session_id()
    }

    /// Whether this subscriber's filter lets `event` through.
    pub fn wants(&self, event: &shared_types::Event) -> bool {
        self.filter.as_ref().map_or(true, |f| f.matches(event))
    }
}

/// Sessions currently receiving forwarded events, keyed by session id.
pub struct SubscriptionRegistry {
    entries: RwLock<BTreeMap<SessionId, Subscription>>,
    max_send_failures: u32,
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SEND_FAILURES)
    }
}

impl SubscriptionRegistry {
    /// A `max_send_failures` of zero is treated as one.
    pub fn new(max_send_failures: u32) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            max_send_failures: max_send_failures.max(1),
        }
    }

    /// Add a live session. Returns `false` when the link is already terminal
    /// or the session is already registered.
    pub fn register(
        &self,
        link: &Arc<dyn SubscriberLink>,
        filter: Option<Arc<dyn EventFilter>>,
    ) -> bool {
        if link.is_terminal() {
            return false;
        }
        let id = link.session_id();
        let mut entries = self.entries.write();
        if entries.contains_key(&id) {
            return false;
        }
        entries.insert(
            id,
            Subscription {
                link: Arc::downgrade(link),
                since: Utc::now(),
                filter,
                send_failures: 0,
            },
        );
        SUBSCRIBERS_REGISTERED.set(entries.len() as f64);
        debug!(session = %id, subscribers = entries.len(), "subscriber registered");
        true
    }

    /// Remove a session. Unknown ids are ignored.
    pub fn unregister(&self, id: SessionId) -> bool {
        let mut entries = self.entries.write();
        let removed = entries.remove(&id).is_some();
        if removed {
            SUBSCRIBERS_REGISTERED.set(entries.len() as f64);
            debug!(session = %id, subscribers = entries.len(), "subscriber unregistered");
        }
        removed
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.entries.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// When the session subscribed, if it is registered.
    pub fn subscribed_since(&self, id: SessionId) -> Option<DateTime<Utc>> {
        self.entries.read().get(&id).map(|s| s.since)
    }

    /// Snapshot of live subscribers. Entries whose session is gone are pruned.
    ///
    /// Sessions registered after the call are not part of the snapshot.
    pub fn active_subscribers(&self) -> Vec<ActiveSubscriber> {
        let mut active = Vec::new();
        let mut dead = Vec::new();
        {
            let entries = self.entries.read();
            for (id, entry) in entries.iter() {
                match entry.link.upgrade() {
                    Some(link) if !link.is_terminal() => active.push(ActiveSubscriber {
                        link,
                        since: entry.since,
                        filter: entry.filter.clone(),
                    }),
                    _ => dead.push(*id),
                }
            }
        }
        if !dead.is_empty() {
            let mut entries = self.entries.write();
            for id in dead {
                entries.remove(&id);
            }
            SUBSCRIBERS_REGISTERED.set(entries.len() as f64);
        }
        active
    }

    /// Count a failed submission. Returns `true` once the subscriber has
    /// failed too many times in a row and should be dropped.
    pub fn record_send_failure(&self, id: SessionId) -> bool {
        let mut entries = self.entries.write();
        match entries.get_mut(&id) {
            Some(entry) => {
                entry.send_failures += 1;
                entry.send_failures >= self.max_send_failures
            }
            None => false,
        }
    }

    pub fn record_send_success(&self, id: SessionId) {
        if let Some(entry) = self.entries.write().get_mut(&id) {
            entry.send_failures = 0;
        }
    }

    pub fn max_send_failures(&self) -> u32 {
        self.max_send_failures
    }
}
