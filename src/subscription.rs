//! Minimal subscription bookkeeping shared by every notifying collaborator
//!
//! Handlers are kept in subscription order and addressed by an opaque
//! [`SubscriptionId`]. Callers snapshot the handlers and release their own
//! locks before invoking them, so a handler may freely call back into the
//! collaborator that notified it.

use std::collections::BTreeMap;
use std::sync::Arc;

/// Opaque handle returned by every `subscribe`-style call
pub type SubscriptionId = u64;

/// Zero-argument change callback
pub type ChangeHandler = Arc<dyn Fn() + Send + Sync>;

/// Ordered set of subscribers carrying an arbitrary payload per subscription
#[derive(Clone)]
pub struct Subscribers<T: Clone> {
    next_id: SubscriptionId,
    entries: BTreeMap<SubscriptionId, T>,
}

impl<T: Clone> Subscribers<T> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            entries: BTreeMap::new(),
        }
    }

    /// Register a subscriber and return its id
    pub fn subscribe(&mut self, entry: T) -> SubscriptionId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(id, entry);
        id
    }

    /// Remove a subscriber. Unknown ids are ignored; returns whether one was removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Clone out all subscribers in subscription order
    pub fn snapshot(&self) -> Vec<T> {
        self.entries.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Clone> Default for Subscribers<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_ordered() {
        let mut subs = Subscribers::new();
        let a = subs.subscribe("a");
        let b = subs.subscribe("b");
        let c = subs.subscribe("c");

        assert!(a < b && b < c);
        assert_eq!(subs.snapshot(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_unsubscribe_unknown_is_noop() {
        let mut subs = Subscribers::new();
        let a = subs.subscribe(1);

        assert!(!subs.unsubscribe(a + 100));
        assert_eq!(subs.len(), 1);

        assert!(subs.unsubscribe(a));
        assert!(subs.is_empty());
        assert!(!subs.unsubscribe(a));
    }

    #[test]
    fn test_ids_not_reused_after_unsubscribe() {
        let mut subs = Subscribers::new();
        let a = subs.subscribe(());
        subs.unsubscribe(a);
        let b = subs.subscribe(());
        assert_ne!(a, b);
    }
}
