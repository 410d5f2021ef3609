//! In-memory names store with change notification

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use super::types::{ChannelType, NamesMap, NamesStore};
use crate::subscription::{ChangeHandler, SubscriptionId, Subscribers};

#[derive(Default)]
struct MemoryInner {
    maps: HashMap<ChannelType, NamesMap>,
    subscribers: Subscribers<(ChannelType, ChangeHandler)>,
    write_count: u64,
}

/// Names store backed by process memory
///
/// Cheap to clone; clones share the same maps and subscribers.
#[derive(Clone, Default)]
pub struct MemoryNamesStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryNamesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated without notifying anyone
    pub fn with_maps(outputs: NamesMap, inputs: NamesMap) -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.lock();
            inner.maps.insert(ChannelType::Output, outputs);
            inner.maps.insert(ChannelType::Input, inputs);
        }
        store
    }

    /// Number of `set` calls seen so far
    pub fn write_count(&self) -> u64 {
        self.inner.lock().write_count
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

impl NamesStore for MemoryNamesStore {
    fn get(&self, channel: ChannelType) -> Option<NamesMap> {
        self.inner.lock().maps.get(&channel).cloned()
    }

    fn set(&self, channel: ChannelType, map: NamesMap) {
        let handlers: Vec<ChangeHandler> = {
            let mut inner = self.inner.lock();
            inner.maps.insert(channel, map);
            inner.write_count += 1;
            inner
                .subscribers
                .snapshot()
                .into_iter()
                .filter(|(subscribed, _)| *subscribed == channel)
                .map(|(_, handler)| handler)
                .collect()
        };

        for handler in handlers {
            handler();
        }
    }

    fn subscribe(&self, channel: ChannelType, handler: ChangeHandler) -> SubscriptionId {
        self.inner.lock().subscribers.subscribe((channel, handler))
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.lock().subscribers.unsubscribe(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_get_absent_key() {
        let store = MemoryNamesStore::new();
        assert_eq!(store.get(ChannelType::Output), None);
    }

    #[test]
    fn test_set_notifies_only_matching_channel() {
        let store = MemoryNamesStore::new();
        let outputs = Arc::new(AtomicUsize::new(0));
        let inputs = Arc::new(AtomicUsize::new(0));

        let counter = outputs.clone();
        store.subscribe(
            ChannelType::Output,
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let counter = inputs.clone();
        store.subscribe(
            ChannelType::Input,
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        store.set(ChannelType::Output, NamesMap::new());

        assert_eq!(outputs.load(Ordering::SeqCst), 1);
        assert_eq!(inputs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handler_can_read_back() {
        let store = MemoryNamesStore::new();
        let seen = Arc::new(Mutex::new(None));

        let reader = store.clone();
        let slot = seen.clone();
        store.subscribe(
            ChannelType::Input,
            Arc::new(move || {
                *slot.lock() = reader.get(ChannelType::Input);
            }),
        );

        let mut map = NamesMap::new();
        map.insert("USB Mic".into(), "Podcast Mic".into());
        store.set(ChannelType::Input, map.clone());

        assert_eq!(*seen.lock(), Some(map));
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let store = MemoryNamesStore::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let id = store.subscribe(
            ChannelType::Output,
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        store.unsubscribe(id);
        store.unsubscribe(id);
        store.set(ChannelType::Output, NamesMap::new());

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(store.subscriber_count(), 0);
    }
}
