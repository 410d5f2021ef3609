//! Rendering surfaces that display device names
//!
//! The engine never reaches into the shell's widget tree directly. It is
//! handed a [`DeviceListSurface`] (the quick-settings device lists, one per
//! channel) and a [`LabelCollection`] (the flat label grid owned by the
//! third-party quick-settings integration). Both only expose label text,
//! which is the one thing reliably addressable on a live surface.

mod additions;
mod label;
pub mod observable_map;
mod panel;
mod tweaker;

pub use additions::{AdditionSource, ObservableAdditions, PollingAdditions};
pub use label::{DeviceItem, Label};
pub use observable_map::ObservableMap;
pub use panel::{AudioPanel, DeviceItems};
pub use tweaker::LabelGrid;

use crate::mixer::DeviceId;
use crate::settings::ChannelType;
use crate::subscription::{ChangeHandler, SubscriptionId};

/// Channel-typed device lists as rendered in the quick-settings panel
pub trait DeviceListSurface: Send + Sync {
    /// Ids of the device entries currently rendered for a channel
    fn displayed_device_ids(&self, channel: ChannelType) -> Vec<DeviceId>;

    /// Labels of the device entries currently rendered for a channel
    fn device_labels(&self, channel: ChannelType) -> Vec<Label>;

    fn device_count(&self, channel: ChannelType) -> usize {
        self.displayed_device_ids(channel).len()
    }

    /// Get notified after every insertion into a channel's device list
    fn subscribe_to_additions(&self, channel: ChannelType, handler: ChangeHandler) -> SubscriptionId;

    /// Release an additions subscription; unknown ids are ignored
    fn unsubscribe_from_additions(&self, channel: ChannelType, id: SubscriptionId);
}

/// Flat collection of labels owned by a third-party integration
pub trait LabelCollection: Send + Sync {
    fn labels(&self) -> Vec<Label>;

    /// Whether the integration finished its own initial render
    fn is_ready(&self) -> bool {
        true
    }
}
