//! SyncEngine - the actor owning all name synchronization state
//!
//! Lifecycle: `Inactive -> Activating -> Active -> Disposing -> Inactive`.
//!
//! While active the engine listens to three sources:
//!
//! 1. Store changes: diff the stored map against the baseline, propagate,
//!    move the baseline forward.
//! 2. Device list growth: reconcile new device names into the stored map,
//!    then resync every rendered entry from the full map. The baseline cannot
//!    be trusted after the device set changed structurally.
//! 3. Active-device changes: look the device up and rename the third-party
//!    label only. Panel lists are already kept consistent by (1) and (2).
//!
//! Commands from all three arrive on a single queue, so handlers never
//! interleave. Each handler reads fresh state instead of relying on anything
//! captured before a suspension point.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

use super::commands::{EngineCommand, Generation};
use super::delay::DelayRegistry;
use super::diff::{generate_diff_update, generate_update_from_single_state, reverse_names_map};
use super::handle::EngineHandle;
use super::propagator::NamePropagator;
use crate::config::{EngineConfig, GrowthDetection};
use crate::mixer::{Mixer, MixerEvent, MixerSource, MixerSubscription};
use crate::settings::{ChannelType, NamesMap, NamesStore};
use crate::subscription::SubscriptionId;
use crate::surface::{
    AdditionSource, DeviceListSurface, LabelCollection, ObservableAdditions, PollingAdditions,
};

/// Engine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineState {
    Inactive,
    Activating,
    Active,
    Disposing,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EngineState::Inactive => "inactive",
            EngineState::Activating => "activating",
            EngineState::Active => "active",
            EngineState::Disposing => "disposing",
        };
        f.write_str(name)
    }
}

/// External collaborators injected into the engine
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn NamesStore>,
    pub mixer_source: Arc<dyn MixerSource>,
    pub panel: Arc<dyn DeviceListSurface>,
    pub tweaker: Arc<dyn LabelCollection>,
}

/// Name synchronization actor
pub struct SyncEngine {
    config: EngineConfig,
    store: Arc<dyn NamesStore>,
    mixer_source: Arc<dyn MixerSource>,
    panel: Arc<dyn DeviceListSurface>,
    propagator: NamePropagator,
    additions: Arc<dyn AdditionSource>,
    delays: DelayRegistry,

    cmd_tx: mpsc::UnboundedSender<EngineCommand>,
    cmd_rx: mpsc::UnboundedReceiver<EngineCommand>,
    state_tx: watch::Sender<EngineState>,

    state: EngineState,
    generation: Generation,
    mixer: Option<Arc<dyn Mixer>>,
    mixer_subscription: Option<MixerSubscription>,
    store_subscriptions: Vec<SubscriptionId>,
    addition_subscriptions: Vec<(ChannelType, SubscriptionId)>,
    /// Last applied view of each persisted map
    baselines: HashMap<ChannelType, NamesMap>,
}

impl SyncEngine {
    /// Build the engine and spawn its actor task. Must run inside a Tokio runtime.
    pub fn spawn(collaborators: Collaborators, config: EngineConfig) -> EngineHandle {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(EngineState::Inactive);
        let delays = DelayRegistry::new();

        let additions: Arc<dyn AdditionSource> = match config.growth_detection {
            GrowthDetection::Observable => {
                Arc::new(ObservableAdditions::new(collaborators.panel.clone()))
            }
            GrowthDetection::Polling { interval_ms } => Arc::new(PollingAdditions::new(
                collaborators.panel.clone(),
                Duration::from_millis(interval_ms),
                delays.clone(),
            )),
        };

        let engine = SyncEngine {
            propagator: NamePropagator::new(collaborators.panel.clone(), collaborators.tweaker),
            store: collaborators.store,
            mixer_source: collaborators.mixer_source,
            panel: collaborators.panel,
            additions,
            delays,
            config,
            cmd_tx: cmd_tx.clone(),
            cmd_rx,
            state_tx,
            state: EngineState::Inactive,
            generation: 0,
            mixer: None,
            mixer_subscription: None,
            store_subscriptions: Vec::new(),
            addition_subscriptions: Vec::new(),
            baselines: HashMap::new(),
        };

        tokio::spawn(engine.run());

        EngineHandle::new(cmd_tx, state_rx)
    }

    async fn run(mut self) {
        info!("Sync engine started ({:?} growth detection)", self.config.growth_detection);

        while let Some(cmd) = self.cmd_rx.recv().await {
            trace!("Engine command: {:?}", cmd);
            match cmd {
                EngineCommand::Enable => self.enable(),
                EngineCommand::Disable(reply) => {
                    self.disable();
                    if let Some(reply) = reply {
                        let _ = reply.send(());
                    }
                }
                EngineCommand::MixerAcquired(generation, result) => {
                    self.on_mixer_acquired(generation, result)
                }
                EngineCommand::StoreChanged(channel) => self.on_store_changed(channel),
                EngineCommand::DevicesAdded(channel) => self.on_devices_added(channel),
                EngineCommand::ActiveDeviceChanged(event) => self.on_active_device_changed(event),
                EngineCommand::ActiveDeviceSettled(generation, event) => {
                    if self.is_current(generation) {
                        self.rename_active_device(event);
                    }
                }
                EngineCommand::TweakerReady(generation) => {
                    if self.is_current(generation) {
                        self.sync_tweaker();
                    }
                }
                EngineCommand::Sync(reply) => {
                    let _ = reply.send(());
                }
                EngineCommand::Shutdown(reply) => {
                    self.disable();
                    if let Some(reply) = reply {
                        let _ = reply.send(());
                    }
                    break;
                }
            }
        }

        info!("Sync engine stopped");
    }

    fn set_state(&mut self, state: EngineState) {
        if self.state != state {
            debug!("Engine state: {} -> {}", self.state, state);
            self.state = state;
            self.state_tx.send_replace(state);
        }
    }

    /// Whether a delayed result belongs to the current, still active session
    fn is_current(&self, generation: Generation) -> bool {
        generation == self.generation && self.state == EngineState::Active
    }

    // ---------------------------------------------------------------------
    // Activating
    // ---------------------------------------------------------------------

    fn enable(&mut self) {
        if self.state != EngineState::Inactive {
            debug!("Enable ignored, engine is {}", self.state);
            return;
        }

        self.generation += 1;
        let generation = self.generation;
        info!("Enabling name synchronization");
        self.set_state(EngineState::Activating);

        let source = self.mixer_source.clone();
        let tx = self.cmd_tx.clone();
        self.delays.spawn(async move {
            let result = source.acquire().await;
            let _ = tx.send(EngineCommand::MixerAcquired(generation, result));
        });
    }

    fn on_mixer_acquired(&mut self, generation: Generation, result: anyhow::Result<Arc<dyn Mixer>>) {
        if generation != self.generation || self.state != EngineState::Activating {
            // Teardown already happened; do not keep a mixer nobody will release
            if let Ok(mixer) = result {
                debug!("Releasing mixer acquired by a cancelled activation");
                mixer.dispose();
            }
            return;
        }

        let mixer = match result {
            Ok(mixer) => mixer,
            Err(e) => {
                warn!("Failed to acquire mixer, staying inactive: {:#}", e);
                self.clear();
                self.set_state(EngineState::Inactive);
                return;
            }
        };
        self.mixer = Some(mixer.clone());

        for channel in ChannelType::all() {
            if let Some(map) = self.reconcile(*channel) {
                self.propagator
                    .apply_update(&generate_update_from_single_state(&map), *channel);
            }
        }

        self.subscribe_to_store();
        self.subscribe_to_additions();

        let tx = self.cmd_tx.clone();
        self.mixer_subscription = Some(mixer.subscribe_active_device_changes(Arc::new(
            move |event: MixerEvent| {
                let _ = tx.send(EngineCommand::ActiveDeviceChanged(event));
            },
        )));

        self.set_state(EngineState::Active);
        info!("Name synchronization active");

        self.when_tweaker_ready();
    }

    fn subscribe_to_store(&mut self) {
        for channel in ChannelType::all().iter().copied() {
            let tx = self.cmd_tx.clone();
            let id = self.store.subscribe(
                channel,
                Arc::new(move || {
                    let _ = tx.send(EngineCommand::StoreChanged(channel));
                }),
            );
            self.store_subscriptions.push(id);
        }
    }

    fn subscribe_to_additions(&mut self) {
        for channel in ChannelType::all().iter().copied() {
            let tx = self.cmd_tx.clone();
            let id = self.additions.subscribe(
                channel,
                Arc::new(move || {
                    let _ = tx.send(EngineCommand::DevicesAdded(channel));
                }),
            );
            self.addition_subscriptions.push((channel, id));
        }
    }

    /// Wait for the integration's own initial render before touching its
    /// labels, retrying with backoff. Gives up (and applies anyway) after
    /// the configured number of attempts.
    fn when_tweaker_ready(&mut self) {
        if self.propagator.tweaker().is_ready() {
            self.sync_tweaker();
            return;
        }

        let generation = self.generation;
        let tweaker = self.propagator.tweaker().clone();
        let backoff = self.config.tweaker_readiness;
        let tx = self.cmd_tx.clone();
        self.delays.spawn(async move {
            for attempt in 0..backoff.max_attempts {
                tokio::time::sleep(backoff.backoff_for(attempt)).await;
                if tweaker.is_ready() {
                    trace!("Integration ready after {} attempts", attempt + 1);
                    let _ = tx.send(EngineCommand::TweakerReady(generation));
                    return;
                }
            }
            warn!(
                "Integration labels not ready after {} attempts, renaming anyway",
                backoff.max_attempts
            );
            let _ = tx.send(EngineCommand::TweakerReady(generation));
        });
    }

    // ---------------------------------------------------------------------
    // Active
    // ---------------------------------------------------------------------

    /// Merge the names of the rendered devices into the stored map as
    /// identity entries, never overwriting existing custom names. Returns
    /// the reconciled map, which also becomes the channel's baseline.
    fn reconcile(&mut self, channel: ChannelType) -> Option<NamesMap> {
        let mixer = self.mixer.as_ref()?;
        let ids = self.panel.displayed_device_ids(channel);
        let devices = mixer.devices_from_ids(&ids, channel);
        if devices.len() < ids.len() {
            debug!(
                "{} of {} rendered {} devices unknown to the mixer",
                ids.len() - devices.len(),
                ids.len(),
                channel
            );
        }

        let existing = self.store.get(channel);
        let mut map = existing.clone().unwrap_or_default();
        let mut added = 0;
        for device in devices {
            if !map.contains_key(&device.display_name) {
                map.insert(device.display_name.clone(), device.display_name);
                added += 1;
            }
        }

        if added > 0 || existing.is_none() {
            debug!("Reconciled {}: {} new device names", channel.settings_key(), added);
            // Baseline first so the notification this write triggers diffs to nothing
            self.baselines.insert(channel, map.clone());
            self.store.set(channel, map.clone());
        } else {
            self.baselines.insert(channel, map.clone());
        }

        Some(map)
    }

    fn on_store_changed(&mut self, channel: ChannelType) {
        if self.state != EngineState::Active {
            trace!("Store change for {} ignored, engine is {}", channel, self.state);
            return;
        }

        let Some(desired) = self.store.get(channel) else {
            trace!("{} absent from store", channel.settings_key());
            return;
        };

        let updates = match self.baselines.get(&channel) {
            Some(current) => generate_diff_update(current, &desired),
            None => Vec::new(),
        };

        if !updates.is_empty() {
            info!("Applying {} {} rename(s)", updates.len(), channel);
            self.propagator.apply_update(&updates, channel);
            self.propagator.apply_tweaker_update(&updates);
        }
        self.baselines.insert(channel, desired);
    }

    fn on_devices_added(&mut self, channel: ChannelType) {
        if self.state != EngineState::Active {
            return;
        }

        debug!("{} device list grew, resyncing", channel);
        if let Some(map) = self.reconcile(channel) {
            self.propagator
                .apply_update(&generate_update_from_single_state(&map), channel);
        }
    }

    fn on_active_device_changed(&mut self, event: MixerEvent) {
        if self.state != EngineState::Active {
            return;
        }

        let settle = self.config.active_device_settle();
        if settle.is_zero() {
            self.rename_active_device(event);
            return;
        }

        // The integration re-renders its label on the same event; let it finish
        let generation = self.generation;
        let tx = self.cmd_tx.clone();
        self.delays.delay(settle, move || {
            let _ = tx.send(EngineCommand::ActiveDeviceSettled(generation, event));
        });
    }

    fn rename_active_device(&self, event: MixerEvent) {
        let channel = event.kind.channel();
        let Some(mixer) = self.mixer.as_ref() else {
            return;
        };
        let Some(device) = mixer.lookup(event.device_id, channel) else {
            trace!("Active {} device {} not found", channel, event.device_id);
            return;
        };
        let Some(custom) = self
            .store
            .get(channel)
            .and_then(|map| map.get(&device.display_name).cloned())
        else {
            return;
        };
        if custom == device.display_name {
            return;
        }

        self.propagator
            .rename_tweaker_label(&device.display_name, &custom);
    }

    /// Bring the integration labels in line with the current baselines
    fn sync_tweaker(&self) {
        for channel in ChannelType::all() {
            if let Some(map) = self.baselines.get(channel) {
                self.propagator
                    .apply_tweaker_update(&generate_update_from_single_state(map));
            }
        }
    }

    // ---------------------------------------------------------------------
    // Disposing
    // ---------------------------------------------------------------------

    fn disable(&mut self) {
        if self.state == EngineState::Inactive {
            debug!("Disable ignored, engine already inactive");
            return;
        }

        info!("Disabling name synchronization");
        self.set_state(EngineState::Disposing);

        if let (Some(mixer), Some(subscription)) = (&self.mixer, self.mixer_subscription.take()) {
            mixer.unsubscribe(&subscription);
        }
        for id in self.store_subscriptions.drain(..) {
            self.store.unsubscribe(id);
        }
        for (channel, id) in self.addition_subscriptions.drain(..) {
            self.additions.unsubscribe(channel, id);
        }

        self.delays.cancel_all();

        self.restore_all_names();

        if let Some(mixer) = self.mixer.take() {
            mixer.dispose();
        }

        self.clear();
        self.set_state(EngineState::Inactive);
        info!("Name synchronization disabled");
    }

    /// Put provider names back on every surface the engine renamed
    fn restore_all_names(&self) {
        let mut restored: HashMap<ChannelType, NamesMap> = HashMap::new();

        for channel in ChannelType::all() {
            // Only channels that were activated can carry renamed labels
            if !self.baselines.contains_key(channel) {
                continue;
            }
            let Some(map) = self.store.get(*channel) else {
                continue;
            };

            let updates = generate_update_from_single_state(&reverse_names_map(&map));
            debug!("Restoring {} {} provider names", updates.len(), channel);
            self.propagator.apply_update(&updates, *channel);
            restored.insert(*channel, map);
        }

        if !restored.is_empty() {
            let outputs = restored.remove(&ChannelType::Output).unwrap_or_default();
            let inputs = restored.remove(&ChannelType::Input).unwrap_or_default();
            self.propagator.restore_tweaker(&outputs, &inputs);
        }
    }

    fn clear(&mut self) {
        self.mixer = None;
        self.mixer_subscription = None;
        self.store_subscriptions.clear();
        self.addition_subscriptions.clear();
        self.baselines.clear();
    }
}
