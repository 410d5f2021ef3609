//! Commands processed by the engine actor

use std::sync::Arc;
use tokio::sync::oneshot;

use crate::mixer::{Mixer, MixerEvent};
use crate::settings::ChannelType;

/// Activation attempt counter; results from an older attempt are stale
pub(crate) type Generation = u64;

pub(crate) enum EngineCommand {
    /// Start activating
    Enable,
    /// Tear down; the sender is resolved once teardown finished
    Disable(Option<oneshot::Sender<()>>),
    /// The mixer acquisition started by `Enable` completed
    MixerAcquired(Generation, anyhow::Result<Arc<dyn Mixer>>),
    /// A persisted names map changed
    StoreChanged(ChannelType),
    /// A rendered device list grew
    DevicesAdded(ChannelType),
    /// The mixer reported a new active device
    ActiveDeviceChanged(MixerEvent),
    /// The settle delay after an active-device change elapsed
    ActiveDeviceSettled(Generation, MixerEvent),
    /// The third-party label grid finished rendering (or we gave up waiting)
    TweakerReady(Generation),
    /// Barrier: resolved after all previously queued commands
    Sync(oneshot::Sender<()>),
    /// Disable, then stop the actor
    Shutdown(Option<oneshot::Sender<()>>),
}

impl std::fmt::Debug for EngineCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineCommand::Enable => write!(f, "Enable"),
            EngineCommand::Disable(_) => write!(f, "Disable"),
            EngineCommand::MixerAcquired(generation, result) => {
                write!(f, "MixerAcquired({}, ok={})", generation, result.is_ok())
            }
            EngineCommand::StoreChanged(channel) => write!(f, "StoreChanged({})", channel),
            EngineCommand::DevicesAdded(channel) => write!(f, "DevicesAdded({})", channel),
            EngineCommand::ActiveDeviceChanged(event) => write!(f, "ActiveDeviceChanged({:?})", event),
            EngineCommand::ActiveDeviceSettled(generation, event) => {
                write!(f, "ActiveDeviceSettled({}, {:?})", generation, event)
            }
            EngineCommand::TweakerReady(generation) => write!(f, "TweakerReady({})", generation),
            EngineCommand::Sync(_) => write!(f, "Sync"),
            EngineCommand::Shutdown(_) => write!(f, "Shutdown"),
        }
    }
}
