//! Subscription registry
//!
//! Entries are keyed by `(session id, subscription id)` with a secondary
//! index by destination: O(1) removal and O(k) broadcast lookup for k
//! subscribers on a destination. Insertion order is preserved within a
//! destination; no order is guaranteed across destinations.

use dashmap::DashMap;
use std::sync::Arc;

use crate::session::{Session, SessionId};

/// A client's standing interest in a destination, tied to a session and a
/// client-chosen id.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: String,
    pub destination: String,
    pub session: Arc<Session>,
}

/// Manages all subscriptions
pub struct SubscriptionRegistry {
    /// All subscriptions by (session id, subscription id)
    entries: DashMap<(SessionId, String), Subscription>,
    /// Keys in registration order, per destination
    by_destination: DashMap<String, Vec<(SessionId, String)>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            by_destination: DashMap::new(),
        }
    }

    /// Register a subscription. A later SUBSCRIBE reusing the same
    /// `(session, id)` pair replaces the earlier entry.
    pub fn add(&self, sub: Subscription) {
        let key = (sub.session.id.clone(), sub.id.clone());
        let destination = sub.destination.clone();

        if let Some(previous) = self.entries.insert(key.clone(), sub) {
            self.unindex(&previous.destination, &key);
        }

        self.by_destination
            .entry(destination)
            .or_default()
            .push(key);
    }

    /// Remove the subscription matching `(session, id)`, if any
    pub fn remove(&self, session_id: &str, id: &str) -> Option<Subscription> {
        let key = (session_id.to_string(), id.to_string());
        let removed = self.entries.remove(&key).map(|(_, sub)| sub);
        if let Some(ref sub) = removed {
            self.unindex(&sub.destination, &key);
        }
        removed
    }

    /// Remove all subscriptions for a session (close/disconnect path)
    pub fn remove_session(&self, session_id: &str) {
        let keys: Vec<_> = self
            .entries
            .iter()
            .filter(|entry| entry.key().0 == session_id)
            .map(|entry| entry.key().clone())
            .collect();

        for key in keys {
            self.remove(&key.0, &key.1);
        }
    }

    /// Drop entries whose connection is no longer open (ping path)
    pub fn sweep_closed(&self) {
        let keys: Vec<_> = self
            .entries
            .iter()
            .filter(|entry| !entry.value().session.is_open())
            .map(|entry| entry.key().clone())
            .collect();

        for key in keys {
            self.remove(&key.0, &key.1);
        }
    }

    /// All subscriptions for a destination, in registration order
    pub fn list_by_destination(&self, destination: &str) -> Vec<Subscription> {
        let Some(keys) = self.by_destination.get(destination) else {
            return Vec::new();
        };
        keys.iter()
            .filter_map(|key| self.entries.get(key).map(|entry| entry.value().clone()))
            .collect()
    }

    /// Get subscription count
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn unindex(&self, destination: &str, key: &(SessionId, String)) {
        let mut emptied = false;
        if let Some(mut keys) = self.by_destination.get_mut(destination) {
            keys.retain(|k| k != key);
            emptied = keys.is_empty();
        }
        if emptied {
            self.by_destination
                .remove_if(destination, |_, keys| keys.is_empty());
        }
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
