//! In-memory mixer used by tests and the `simulate` command

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

use super::{AudioDevice, DeviceId, Mixer, MixerEvent, MixerEventHandler, MixerEventKind, MixerSource, MixerSubscription};
use crate::settings::ChannelType;
use crate::subscription::Subscribers;

struct MixerInner {
    devices: Mutex<BTreeMap<(ChannelType, DeviceId), AudioDevice>>,
    subscribers: Mutex<Subscribers<(MixerEventKind, MixerEventHandler)>>,
    ready_tx: watch::Sender<bool>,
    disposed: AtomicBool,
}

/// Mixer whose devices and active-device events are driven by the caller
#[derive(Clone)]
pub struct MemoryMixer {
    inner: Arc<MixerInner>,
}

impl MemoryMixer {
    /// New mixer, not yet ready
    pub fn new() -> Self {
        let (ready_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(MixerInner {
                devices: Mutex::new(BTreeMap::new()),
                subscribers: Mutex::new(Subscribers::new()),
                ready_tx,
                disposed: AtomicBool::new(false),
            }),
        }
    }

    pub fn add_device(&self, id: DeviceId, name: impl Into<String>, channel: ChannelType) -> AudioDevice {
        let device = AudioDevice {
            id,
            display_name: name.into(),
            channel,
        };
        self.inner.devices.lock().insert((channel, id), device.clone());
        device
    }

    /// Signal readiness, releasing pending `acquire` calls
    pub fn mark_ready(&self) {
        self.inner.ready_tx.send_replace(true);
    }

    pub fn is_ready(&self) -> bool {
        *self.inner.ready_tx.borrow()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    /// Make `id` the active device of `channel` and emit the event
    pub fn set_active(&self, channel: ChannelType, id: DeviceId) {
        let kind = MixerEventKind::for_channel(channel);
        let event = MixerEvent { kind, device_id: id };
        let handlers: Vec<MixerEventHandler> = self
            .inner
            .subscribers
            .lock()
            .snapshot()
            .into_iter()
            .filter(|(subscribed, _)| *subscribed == kind)
            .map(|(_, handler)| handler)
            .collect();

        debug!("Active {} device -> {}", channel, id);
        for handler in handlers {
            handler(event);
        }
    }

    async fn wait_until_ready(&self) -> Result<()> {
        let mut ready_rx = self.inner.ready_tx.subscribe();
        if ready_rx.wait_for(|ready| *ready).await.is_err() {
            bail!("Mixer readiness channel closed");
        }
        Ok(())
    }
}

impl Default for MemoryMixer {
    fn default() -> Self {
        Self::new()
    }
}

impl Mixer for MemoryMixer {
    fn lookup(&self, id: DeviceId, channel: ChannelType) -> Option<AudioDevice> {
        self.inner.devices.lock().get(&(channel, id)).cloned()
    }

    fn subscribe_active_device_changes(&self, handler: MixerEventHandler) -> MixerSubscription {
        let mut subscribers = self.inner.subscribers.lock();
        let output = subscribers.subscribe((MixerEventKind::ActiveOutputUpdate, handler.clone()));
        let input = subscribers.subscribe((MixerEventKind::ActiveInputUpdate, handler));
        MixerSubscription {
            ids: vec![output, input],
        }
    }

    fn unsubscribe(&self, subscription: &MixerSubscription) {
        let mut subscribers = self.inner.subscribers.lock();
        for id in &subscription.ids {
            subscribers.unsubscribe(*id);
        }
    }

    fn dispose(&self) {
        if !self.inner.disposed.swap(true, Ordering::SeqCst) {
            info!("Mixer disposed");
        }
    }
}

/// Hands out a [`MemoryMixer`] once it is ready plus a settle delay
pub struct MemoryMixerSource {
    mixer: MemoryMixer,
    settle: Duration,
}

impl MemoryMixerSource {
    pub fn new(mixer: MemoryMixer, settle: Duration) -> Self {
        Self { mixer, settle }
    }
}

#[async_trait]
impl MixerSource for MemoryMixerSource {
    async fn acquire(&self) -> Result<Arc<dyn Mixer>> {
        self.mixer.wait_until_ready().await?;
        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }
        Ok(Arc::new(self.mixer.clone()))
    }
}
