//! Growth-observable map
//!
//! Wraps a native ordered map so that insertions can be observed by a host
//! collection that has no notification support of its own. Only insertions
//! notify; reads and removals pass straight through.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::subscription::{ChangeHandler, SubscriptionId, Subscribers};

pub struct ObservableMap<K: Ord, V> {
    entries: BTreeMap<K, V>,
    observers: Subscribers<ChangeHandler>,
}

impl<K: Ord, V> ObservableMap<K, V> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            observers: Subscribers::new(),
        }
    }

    /// Wrap an existing map, keeping every entry
    pub fn from_native_map(map: BTreeMap<K, V>) -> Self {
        Self {
            entries: map,
            observers: Subscribers::new(),
        }
    }

    /// Unwrap back into the native map, dropping all observers
    pub fn into_native_map(self) -> BTreeMap<K, V> {
        self.entries
    }

    pub fn subscribe(&mut self, handler: impl Fn() + Send + Sync + 'static) -> SubscriptionId {
        self.observers.subscribe(Arc::new(handler))
    }

    pub fn subscribe_handler(&mut self, handler: ChangeHandler) -> SubscriptionId {
        self.observers.subscribe(handler)
    }

    /// Unknown ids are ignored
    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.observers.unsubscribe(id);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Insert and synchronously run every observer, in subscription order
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let (previous, observers) = self.insert_deferred(key, value);
        for observer in observers {
            observer();
        }
        previous
    }

    /// Insert and hand the observers back instead of running them, so a
    /// caller holding a lock can release it first
    pub fn insert_deferred(&mut self, key: K, value: V) -> (Option<V>, Vec<ChangeHandler>) {
        let previous = self.entries.insert(key, value);
        (previous, self.observers.snapshot())
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::collections::btree_map::Iter<'_, K, V> {
        self.entries.iter()
    }

    pub fn keys(&self) -> std::collections::btree_map::Keys<'_, K, V> {
        self.entries.keys()
    }

    pub fn values(&self) -> std::collections::btree_map::Values<'_, K, V> {
        self.entries.values()
    }
}

impl<K: Ord + Clone, V: Clone> ObservableMap<K, V> {
    /// Copy of the wrapped map
    pub fn to_native_map(&self) -> BTreeMap<K, V> {
        self.entries.clone()
    }
}

impl<K: Ord, V> Default for ObservableMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, K: Ord, V> IntoIterator for &'a ObservableMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = std::collections::btree_map::Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample() -> BTreeMap<u32, String> {
        let mut map = BTreeMap::new();
        map.insert(1, "one".to_string());
        map.insert(2, "two".to_string());
        map
    }

    fn counting(map: &mut ObservableMap<u32, String>) -> (Arc<AtomicUsize>, SubscriptionId) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let id = map.subscribe(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (count, id)
    }

    #[test]
    fn test_reads_pass_through() {
        let map = ObservableMap::from_native_map(sample());

        assert_eq!(map.get(&1).map(String::as_str), Some("one"));
        assert!(map.contains_key(&2));
        assert!(!map.contains_key(&3));
        let collected: Vec<(u32, String)> = map.iter().map(|(k, v)| (*k, v.clone())).collect();
        assert_eq!(collected, vec![(1, "one".into()), (2, "two".into())]);
    }

    #[test]
    fn test_insert_notifies_once() {
        let mut map = ObservableMap::from_native_map(sample());
        let (count, _) = counting(&mut map);

        map.insert(3, "three".to_string());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_unsubscribed_handler_not_called() {
        let mut map = ObservableMap::from_native_map(sample());
        let (count, id) = counting(&mut map);

        map.unsubscribe(id);
        map.unsubscribe(id + 42);
        map.insert(3, "three".to_string());

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handlers_run_in_subscription_order() {
        let mut map: ObservableMap<u32, String> = ObservableMap::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let order = order.clone();
            map.subscribe(move || order.lock().push(tag));
        }

        map.insert(7, "seven".to_string());

        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_removal_does_not_notify() {
        let mut map = ObservableMap::from_native_map(sample());
        let (count, _) = counting(&mut map);

        map.remove(&1);

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_native_round_trip_is_lossless() {
        let native = sample();
        let observable = ObservableMap::from_native_map(native.clone());

        assert_eq!(observable.to_native_map(), native);
        let keys: Vec<u32> = observable.into_native_map().into_keys().collect();
        assert_eq!(keys, vec![1, 2]);
    }

    #[test]
    fn test_insert_deferred_returns_observers() {
        let mut map = ObservableMap::from_native_map(sample());
        let (count, _) = counting(&mut map);

        let (previous, observers) = map.insert_deferred(1, "uno".to_string());
        assert_eq!(previous.as_deref(), Some("one"));
        assert_eq!(count.load(Ordering::SeqCst), 0);

        observers.iter().for_each(|observer| observer());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
