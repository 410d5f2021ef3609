//! Device-list growth detection strategies
//!
//! Both strategies sit behind [`AdditionSource`] and are chosen by
//! configuration. The observable strategy wraps the panel's device list; the
//! polling strategy is the fallback for hosts whose lists cannot be wrapped.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use super::DeviceListSurface;
use crate::settings::ChannelType;
use crate::subscription::{ChangeHandler, SubscriptionId};
use crate::sync::delay::{DelayRegistry, TaskId};

/// Notifies when a channel's rendered device list grows
pub trait AdditionSource: Send + Sync {
    fn subscribe(&self, channel: ChannelType, handler: ChangeHandler) -> SubscriptionId;

    /// Unknown ids are ignored
    fn unsubscribe(&self, channel: ChannelType, id: SubscriptionId);
}

/// Growth events straight from the observable-wrapped device list
pub struct ObservableAdditions {
    surface: Arc<dyn DeviceListSurface>,
}

impl ObservableAdditions {
    pub fn new(surface: Arc<dyn DeviceListSurface>) -> Self {
        Self { surface }
    }
}

impl AdditionSource for ObservableAdditions {
    fn subscribe(&self, channel: ChannelType, handler: ChangeHandler) -> SubscriptionId {
        self.surface.subscribe_to_additions(channel, handler)
    }

    fn unsubscribe(&self, channel: ChannelType, id: SubscriptionId) {
        self.surface.unsubscribe_from_additions(channel, id);
    }
}

/// Growth events derived from polling the device count on an interval
pub struct PollingAdditions {
    surface: Arc<dyn DeviceListSurface>,
    interval: Duration,
    delays: DelayRegistry,
    pollers: Mutex<HashMap<SubscriptionId, TaskId>>,
    next_id: Mutex<SubscriptionId>,
}

impl PollingAdditions {
    pub fn new(surface: Arc<dyn DeviceListSurface>, interval: Duration, delays: DelayRegistry) -> Self {
        Self {
            surface,
            interval,
            delays,
            pollers: Mutex::new(HashMap::new()),
            next_id: Mutex::new(0),
        }
    }

    pub fn active_pollers(&self) -> usize {
        self.pollers.lock().len()
    }
}

impl AdditionSource for PollingAdditions {
    fn subscribe(&self, channel: ChannelType, handler: ChangeHandler) -> SubscriptionId {
        let id = {
            let mut next = self.next_id.lock();
            let id = *next;
            *next += 1;
            id
        };

        let surface = self.surface.clone();
        let interval = self.interval;
        // Counted now, so growth before the task first runs still fires
        let mut last_count = surface.device_count(channel);
        let task = self.delays.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let count = surface.device_count(channel);
                if count > last_count {
                    trace!("Polling saw {} list grow {} -> {}", channel, last_count, count);
                    handler();
                }
                last_count = count;
            }
        });

        self.pollers.lock().insert(id, task);
        debug!("Polling {} device list every {:?}", channel, interval);
        id
    }

    fn unsubscribe(&self, _channel: ChannelType, id: SubscriptionId) {
        if let Some(task) = self.pollers.lock().remove(&id) {
            self.delays.cancel(task);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::AudioPanel;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_polling_reports_growth() {
        let panel = AudioPanel::new();
        panel.insert_device(ChannelType::Output, 1, "Speakers");

        let delays = DelayRegistry::new();
        let additions = PollingAdditions::new(Arc::new(panel.clone()), Duration::from_millis(10), delays.clone());

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let id = additions.subscribe(
            ChannelType::Output,
            Arc::new(move || {
                let _ = tx.send(());
            }),
        );

        tokio::time::sleep(Duration::from_millis(30)).await;
        panel.insert_device(ChannelType::Output, 2, "HDMI Output");

        let notified = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert!(matches!(notified, Ok(Some(()))));
        // Polling never wraps the list
        assert!(!panel.is_observable(ChannelType::Output));

        additions.unsubscribe(ChannelType::Output, id);
        assert_eq!(additions.active_pollers(), 0);
        assert_eq!(delays.pending(), 0);
    }

    #[tokio::test]
    async fn test_polling_sees_growth_right_after_subscribe() {
        let panel = AudioPanel::new();
        panel.insert_device(ChannelType::Output, 1, "Speakers");

        let additions = PollingAdditions::new(Arc::new(panel.clone()), Duration::from_millis(5), DelayRegistry::new());
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        additions.subscribe(
            ChannelType::Output,
            Arc::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );
        // Before the poller task had a chance to run
        panel.insert_device(ChannelType::Output, 2, "HDMI Output");
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_polling_ignores_shrink() {
        let panel = AudioPanel::new();
        panel.insert_device(ChannelType::Input, 1, "USB Mic");
        panel.insert_device(ChannelType::Input, 2, "Webcam Mic");

        let additions = PollingAdditions::new(Arc::new(panel.clone()), Duration::from_millis(5), DelayRegistry::new());
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        additions.subscribe(
            ChannelType::Input,
            Arc::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );

        panel.remove_device(ChannelType::Input, 2);
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_observable_additions_delegate_to_panel() {
        let panel = AudioPanel::new();
        let additions = ObservableAdditions::new(Arc::new(panel.clone()));
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();

        let id = additions.subscribe(
            ChannelType::Output,
            Arc::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );
        panel.insert_device(ChannelType::Output, 3, "Speakers");
        additions.unsubscribe(ChannelType::Output, id);
        panel.insert_device(ChannelType::Output, 4, "HDMI Output");

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!panel.is_observable(ChannelType::Output));
    }
}
