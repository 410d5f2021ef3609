//! Device-control collaborator (the audio mixer)
//!
//! The engine acquires a [`Mixer`] asynchronously through a [`MixerSource`],
//! uses it to turn rendered device ids into provider-reported names, and
//! listens to its active-device events.

mod memory;

pub use memory::{MemoryMixer, MemoryMixerSource};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::settings::{ChannelType, OriginalName};
use crate::subscription::SubscriptionId;

/// Ephemeral device id assigned by the audio subsystem. Never persisted.
pub type DeviceId = u32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioDevice {
    pub id: DeviceId,
    pub display_name: OriginalName,
    pub channel: ChannelType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MixerEventKind {
    ActiveOutputUpdate,
    ActiveInputUpdate,
}

impl MixerEventKind {
    pub fn channel(&self) -> ChannelType {
        match self {
            MixerEventKind::ActiveOutputUpdate => ChannelType::Output,
            MixerEventKind::ActiveInputUpdate => ChannelType::Input,
        }
    }

    pub fn for_channel(channel: ChannelType) -> Self {
        match channel {
            ChannelType::Output => MixerEventKind::ActiveOutputUpdate,
            ChannelType::Input => MixerEventKind::ActiveInputUpdate,
        }
    }
}

/// The active device of a channel changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixerEvent {
    pub kind: MixerEventKind,
    pub device_id: DeviceId,
}

pub type MixerEventHandler = Arc<dyn Fn(MixerEvent) + Send + Sync>;

/// Handle for an active-device subscription (one id per underlying signal)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixerSubscription {
    pub ids: Vec<SubscriptionId>,
}

pub trait Mixer: Send + Sync {
    /// Look up a device by id; `None` if the subsystem does not know it
    fn lookup(&self, id: DeviceId, channel: ChannelType) -> Option<AudioDevice>;

    /// Resolve several ids at once, skipping the ones that miss
    fn devices_from_ids(&self, ids: &[DeviceId], channel: ChannelType) -> Vec<AudioDevice> {
        ids.iter()
            .filter_map(|id| self.lookup(*id, channel))
            .collect()
    }

    fn subscribe_active_device_changes(&self, handler: MixerEventHandler) -> MixerSubscription;

    fn unsubscribe(&self, subscription: &MixerSubscription);

    /// Release the mixer; it must not be used afterwards
    fn dispose(&self);
}

/// Produces a ready-to-use mixer, suspending until the subsystem is ready
#[async_trait]
pub trait MixerSource: Send + Sync {
    async fn acquire(&self) -> Result<Arc<dyn Mixer>>;
}
