//! Names map type definitions and the store capability

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::subscription::{ChangeHandler, SubscriptionId};

/// Device name as reported by the OS / audio subsystem
pub type OriginalName = String;

/// User-chosen display name
pub type CustomName = String;

/// Mapping from provider-reported name to display name
pub type NamesMap = BTreeMap<OriginalName, CustomName>;

/// Audio direction; each has its own names map and device set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Output,
    Input,
}

impl ChannelType {
    /// Both channel types, outputs first
    pub const fn all() -> &'static [ChannelType] {
        &[ChannelType::Output, ChannelType::Input]
    }

    /// Settings key under which this channel's names map is persisted
    pub const fn settings_key(&self) -> &'static str {
        match self {
            ChannelType::Output => "output-names-map",
            ChannelType::Input => "input-names-map",
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            ChannelType::Output => "output",
            ChannelType::Input => "input",
        }
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "output" | "outputs" => Ok(ChannelType::Output),
            "input" | "inputs" => Ok(ChannelType::Input),
            other => Err(format!("unknown channel type '{}' (expected output or input)", other)),
        }
    }
}

/// Persisted key-value settings holding one names map per channel
///
/// `set` notifies the subscribers of that channel only. Handlers run on the
/// caller's thread after the store released its internal locks.
pub trait NamesStore: Send + Sync {
    /// Current map for a channel, `None` if the key was never written
    fn get(&self, channel: ChannelType) -> Option<NamesMap>;

    /// Overwrite the map for a channel and notify its subscribers
    fn set(&self, channel: ChannelType, map: NamesMap);

    /// Subscribe to changes of one channel's map
    fn subscribe(&self, channel: ChannelType, handler: ChangeHandler) -> SubscriptionId;

    /// Release a subscription; unknown ids are ignored
    fn unsubscribe(&self, id: SubscriptionId);
}
