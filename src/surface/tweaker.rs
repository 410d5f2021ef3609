//! Label grid of the third-party quick-settings integration
//!
//! The integration renders the active output/input device names as plain
//! labels in the quick-settings grid, among unrelated labels.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::label::Label;
use super::LabelCollection;

#[derive(Default)]
struct GridInner {
    labels: Mutex<Vec<Label>>,
    ready: AtomicBool,
}

/// In-process model of the integration's flat label collection
#[derive(Clone, Default)]
pub struct LabelGrid {
    inner: Arc<GridInner>,
}

impl LabelGrid {
    /// Empty grid that has not rendered yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty grid already marked ready
    pub fn ready() -> Self {
        let grid = Self::new();
        grid.set_ready(true);
        grid
    }

    pub fn add_label(&self, text: impl Into<String>) -> Label {
        let label = Label::new(text);
        self.inner.labels.lock().push(label.clone());
        label
    }

    pub fn set_ready(&self, ready: bool) {
        self.inner.ready.store(ready, Ordering::SeqCst);
    }

    pub fn texts(&self) -> Vec<String> {
        self.inner.labels.lock().iter().map(Label::text).collect()
    }
}

impl LabelCollection for LabelGrid {
    fn labels(&self) -> Vec<Label> {
        self.inner.labels.lock().clone()
    }

    fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readiness_flag() {
        let grid = LabelGrid::new();
        assert!(!grid.is_ready());
        grid.set_ready(true);
        assert!(grid.is_ready());
        assert!(LabelGrid::ready().is_ready());
    }

    #[test]
    fn test_labels_share_handles() {
        let grid = LabelGrid::ready();
        let label = grid.add_label("Speakers");

        grid.labels()[0].set_text("Living Room");

        assert_eq!(label.text(), "Living Room");
        assert_eq!(grid.texts(), vec!["Living Room"]);
    }
}
