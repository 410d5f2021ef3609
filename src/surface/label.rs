//! Shared label handles

use parking_lot::Mutex;
use std::sync::Arc;

/// Handle to a rendered text label
///
/// Clones point at the same label, like widget references in the shell.
#[derive(Clone, Default)]
pub struct Label {
    text: Arc<Mutex<String>>,
}

impl Label {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Arc::new(Mutex::new(text.into())),
        }
    }

    pub fn text(&self) -> String {
        self.text.lock().clone()
    }

    pub fn set_text(&self, text: impl Into<String>) {
        *self.text.lock() = text.into();
    }

    /// Whether both handles refer to the same label
    pub fn same_label(&self, other: &Label) -> bool {
        Arc::ptr_eq(&self.text, &other.text)
    }
}

impl std::fmt::Debug for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Label").field(&*self.text.lock()).finish()
    }
}

/// One entry of a quick-settings device list
#[derive(Debug, Clone, Default)]
pub struct DeviceItem {
    pub label: Label,
}

impl DeviceItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            label: Label::new(text),
        }
    }
}
