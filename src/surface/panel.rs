//! Quick-settings audio panel: one device list per channel
//!
//! Each list starts out as a plain map. Subscribing to additions swaps it for
//! an [`ObservableMap`] holding the same entries; once the last subscriber is
//! gone it is converted back, leaving the list exactly as it was found.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace};

use super::label::{DeviceItem, Label};
use super::observable_map::ObservableMap;
use super::DeviceListSurface;
use crate::mixer::DeviceId;
use crate::settings::ChannelType;
use crate::subscription::{ChangeHandler, SubscriptionId};

/// Device entries of one channel, in native or growth-observable form
pub enum DeviceItems {
    Native(BTreeMap<DeviceId, DeviceItem>),
    Observable(ObservableMap<DeviceId, DeviceItem>),
}

impl DeviceItems {
    pub fn is_observable(&self) -> bool {
        matches!(self, DeviceItems::Observable(_))
    }

    pub fn len(&self) -> usize {
        match self {
            DeviceItems::Native(map) => map.len(),
            DeviceItems::Observable(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> Vec<DeviceId> {
        match self {
            DeviceItems::Native(map) => map.keys().copied().collect(),
            DeviceItems::Observable(map) => map.keys().copied().collect(),
        }
    }

    pub fn items(&self) -> Vec<DeviceItem> {
        match self {
            DeviceItems::Native(map) => map.values().cloned().collect(),
            DeviceItems::Observable(map) => map.values().cloned().collect(),
        }
    }

    /// Insert an entry; returns the observers to run once the caller is unlocked
    fn insert(&mut self, id: DeviceId, item: DeviceItem) -> Vec<ChangeHandler> {
        match self {
            DeviceItems::Native(map) => {
                map.insert(id, item);
                Vec::new()
            }
            DeviceItems::Observable(map) => map.insert_deferred(id, item).1,
        }
    }

    fn remove(&mut self, id: DeviceId) -> Option<DeviceItem> {
        match self {
            DeviceItems::Native(map) => map.remove(&id),
            DeviceItems::Observable(map) => map.remove(&id),
        }
    }

    /// Make the list observable, reusing an existing wrapper
    fn make_observable(&mut self) -> &mut ObservableMap<DeviceId, DeviceItem> {
        if let DeviceItems::Native(map) = self {
            let native = std::mem::take(map);
            *self = DeviceItems::Observable(ObservableMap::from_native_map(native));
        }
        match self {
            DeviceItems::Observable(map) => map,
            DeviceItems::Native(_) => unreachable!("device items were just made observable"),
        }
    }

    fn make_native(&mut self) {
        if let DeviceItems::Observable(map) = self {
            let native = std::mem::take(map).into_native_map();
            *self = DeviceItems::Native(native);
        }
    }
}

impl Default for DeviceItems {
    fn default() -> Self {
        DeviceItems::Native(BTreeMap::new())
    }
}

#[derive(Default)]
struct PanelInner {
    outputs: Mutex<DeviceItems>,
    inputs: Mutex<DeviceItems>,
}

impl PanelInner {
    fn items(&self, channel: ChannelType) -> &Mutex<DeviceItems> {
        match channel {
            ChannelType::Output => &self.outputs,
            ChannelType::Input => &self.inputs,
        }
    }
}

/// In-process model of the quick-settings volume panel
///
/// Cheap to clone; clones share the same device lists. The host adds and
/// removes entries as devices come and go; the engine only reads labels and
/// subscribes to growth.
#[derive(Clone, Default)]
pub struct AudioPanel {
    inner: Arc<PanelInner>,
}

impl AudioPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render a new device entry showing `text`
    pub fn insert_device(&self, channel: ChannelType, id: DeviceId, text: impl Into<String>) -> Label {
        let item = DeviceItem::new(text);
        let label = item.label.clone();

        let observers = self.inner.items(channel).lock().insert(id, item);
        trace!("Panel {} entry {} added ({} observers)", channel, id, observers.len());
        for observer in observers {
            observer();
        }

        label
    }

    pub fn remove_device(&self, channel: ChannelType, id: DeviceId) -> Option<DeviceItem> {
        self.inner.items(channel).lock().remove(id)
    }

    pub fn label_texts(&self, channel: ChannelType) -> Vec<String> {
        self.device_labels(channel).iter().map(Label::text).collect()
    }

    pub fn is_observable(&self, channel: ChannelType) -> bool {
        self.inner.items(channel).lock().is_observable()
    }
}

impl DeviceListSurface for AudioPanel {
    fn displayed_device_ids(&self, channel: ChannelType) -> Vec<DeviceId> {
        self.inner.items(channel).lock().ids()
    }

    fn device_labels(&self, channel: ChannelType) -> Vec<Label> {
        self.inner
            .items(channel)
            .lock()
            .items()
            .into_iter()
            .map(|item| item.label)
            .collect()
    }

    fn device_count(&self, channel: ChannelType) -> usize {
        self.inner.items(channel).lock().len()
    }

    fn subscribe_to_additions(&self, channel: ChannelType, handler: ChangeHandler) -> SubscriptionId {
        let mut items = self.inner.items(channel).lock();
        let wrapped = !items.is_observable();
        let id = items.make_observable().subscribe_handler(handler);
        if wrapped {
            debug!("Panel {} list wrapped as observable", channel);
        }
        id
    }

    fn unsubscribe_from_additions(&self, channel: ChannelType, id: SubscriptionId) {
        let mut items = self.inner.items(channel).lock();
        let DeviceItems::Observable(map) = &mut *items else {
            return;
        };

        map.unsubscribe(id);
        if map.observer_count() == 0 {
            items.make_native();
            debug!("Panel {} list restored to native", channel);
        }
    }
}
