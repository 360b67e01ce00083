//! # Subscription Registry
//!
//! Maps device ids to the set of client connections interested in them. The
//! map is the single shared mutable resource of the fan-out path, so every
//! read and mutation goes through these methods and their one lock; the map
//! is never exposed raw.
//!
//! Invariant: a device id is present iff its subscriber set is non-empty.
//! Empty sets are pruned on unsubscribe and disconnect, so fan-out can skip
//! devices with no subscribers without a membership test against an empty
//! set.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Device-keyed registry of subscriber connection ids.
#[derive(Default)]
pub struct SubscriptionRegistry {
    subscriptions: Mutex<HashMap<i64, HashSet<u64>>>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a client to a device's subscriber set, creating the set on the
    /// first subscriber. Returns true if the client was not already
    /// subscribed.
    pub fn subscribe(&self, device_id: i64, client_id: u64) -> bool {
        let mut subs = self.subscriptions.lock().expect("Registry lock poisoned");
        subs.entry(device_id).or_default().insert(client_id)
    }

    /// Removes a client from a device's subscriber set, pruning the entry
    /// when the set empties. Returns true if the client was subscribed.
    pub fn unsubscribe(&self, device_id: i64, client_id: u64) -> bool {
        let mut subs = self.subscriptions.lock().expect("Registry lock poisoned");
        let Some(set) = subs.get_mut(&device_id) else {
            return false;
        };
        let removed = set.remove(&client_id);
        if set.is_empty() {
            subs.remove(&device_id);
        }
        removed
    }

    /// Removes a disconnecting client from every subscriber set it belongs
    /// to, pruning now-empty sets, in one full scan.
    pub fn remove_client(&self, client_id: u64) {
        let mut subs = self.subscriptions.lock().expect("Registry lock poisoned");
        subs.retain(|_, set| {
            set.remove(&client_id);
            !set.is_empty()
        });
    }

    /// Whether any client is subscribed to a device.
    pub fn has_subscribers(&self, device_id: i64) -> bool {
        let subs = self.subscriptions.lock().expect("Registry lock poisoned");
        subs.contains_key(&device_id)
    }

    /// Snapshot of a device's subscriber set.
    pub fn subscribers_of(&self, device_id: i64) -> Vec<u64> {
        let subs = self.subscriptions.lock().expect("Registry lock poisoned");
        subs.get(&device_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Snapshot of all devices with at least one subscriber.
    pub fn tracked_devices(&self) -> Vec<i64> {
        let subs = self.subscriptions.lock().expect("Registry lock poisoned");
        subs.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_exists_iff_subscribers_exist() {
        let registry = SubscriptionRegistry::new();
        assert!(!registry.has_subscribers(42));

        assert!(registry.subscribe(42, 1));
        assert!(registry.has_subscribers(42));
        // Re-subscribing the same client is not a new subscription.
        assert!(!registry.subscribe(42, 1));

        assert!(registry.unsubscribe(42, 1));
        assert!(!registry.has_subscribers(42));
        assert!(registry.tracked_devices().is_empty());
    }

    #[test]
    fn disconnect_prunes_all_memberships() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe(1, 10);
        registry.subscribe(2, 10);
        registry.subscribe(2, 11);

        registry.remove_client(10);

        assert!(!registry.has_subscribers(1));
        assert_eq!(registry.subscribers_of(2), vec![11]);
    }

    #[test]
    fn unsubscribe_unknown_device_is_noop() {
        let registry = SubscriptionRegistry::new();
        assert!(!registry.unsubscribe(5, 1));
    }
}
