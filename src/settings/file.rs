//! JSON file backed names store
//!
//! Both channel maps live in one document keyed by their settings keys:
//!
//! ```json
//! {
//!   "output-names-map": { "Speakers": "Living Room" },
//!   "input-names-map": { "USB Mic": "Podcast Mic" }
//! }
//! ```

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use super::types::{ChannelType, NamesMap, NamesStore};
use super::validation::{validate, ValidationError};
use super::watcher::NamesFileWatcher;
use crate::subscription::{ChangeHandler, SubscriptionId, Subscribers};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Validation(#[from] ValidationError),
}

/// On-disk layout of the names file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamesDocument {
    #[serde(
        rename = "output-names-map",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub outputs: Option<NamesMap>,
    #[serde(
        rename = "input-names-map",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub inputs: Option<NamesMap>,
}

impl NamesDocument {
    pub fn get(&self, channel: ChannelType) -> Option<&NamesMap> {
        match channel {
            ChannelType::Output => self.outputs.as_ref(),
            ChannelType::Input => self.inputs.as_ref(),
        }
    }

    fn slot_mut(&mut self, channel: ChannelType) -> &mut Option<NamesMap> {
        match channel {
            ChannelType::Output => &mut self.outputs,
            ChannelType::Input => &mut self.inputs,
        }
    }

    /// Load from disk; a missing file is an empty document
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let json = fs::read_to_string(path)?;
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&json)?)
    }

    /// Write to disk atomically (temp file + rename)
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

struct FileInner {
    document: NamesDocument,
    subscribers: Subscribers<(ChannelType, ChangeHandler)>,
}

impl FileInner {
    fn handlers_for(&self, channel: ChannelType) -> Vec<ChangeHandler> {
        self.subscribers
            .snapshot()
            .into_iter()
            .filter(|(subscribed, _)| *subscribed == channel)
            .map(|(_, handler)| handler)
            .collect()
    }
}

/// Names store persisted to a JSON file
///
/// Cheap to clone; clones share state. Call [`FileNamesStore::watch`] to
/// receive change notifications for edits made by other processes.
#[derive(Clone)]
pub struct FileNamesStore {
    path: Arc<PathBuf>,
    inner: Arc<Mutex<FileInner>>,
    watcher: Arc<Mutex<Option<NamesFileWatcher>>>,
}

impl FileNamesStore {
    /// Open (or lazily create on first write) the names file at `path`
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let document = NamesDocument::load_from_file(&path)?;
        debug!("Names file opened: {}", path.display());

        Ok(Self {
            path: Arc::new(path),
            inner: Arc::new(Mutex::new(FileInner {
                document,
                subscribers: Subscribers::new(),
            })),
            watcher: Arc::new(Mutex::new(None)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start reacting to external modifications of the file. Idempotent.
    pub fn watch(&self) -> anyhow::Result<()> {
        let mut slot = self.watcher.lock();
        if slot.is_some() {
            return Ok(());
        }

        let path = self.path.clone();
        let inner: Weak<Mutex<FileInner>> = Arc::downgrade(&self.inner);
        let watcher = NamesFileWatcher::spawn(
            &self.path,
            Arc::new(move || {
                if let Some(inner) = inner.upgrade() {
                    reload(&path, &inner);
                }
            }),
        )?;

        *slot = Some(watcher);
        Ok(())
    }

    /// Stop watching the file
    pub fn unwatch(&self) {
        if self.watcher.lock().take().is_some() {
            info!("Names file watcher stopped for: {}", self.path.display());
        }
    }

    /// Re-read the file and notify channels whose map changed
    pub fn reload(&self) {
        reload(&self.path, &self.inner);
    }

    /// Persist a map and notify subscribers. Nothing changes if the write fails.
    pub fn try_set(&self, channel: ChannelType, map: NamesMap) -> Result<(), StoreError> {
        let handlers = {
            let mut inner = self.inner.lock();
            let mut document = inner.document.clone();
            *document.slot_mut(channel) = Some(map);
            document.save_to_file(self.path.as_path())?;
            inner.document = document;
            inner.handlers_for(channel)
        };

        trace!("Persisted {} to {}", channel.settings_key(), self.path.display());
        for handler in handlers {
            handler();
        }
        Ok(())
    }

    /// Validate, then persist. A rejected map is never written.
    pub fn set_validated(&self, channel: ChannelType, map: NamesMap) -> Result<(), StoreError> {
        validate(&map)?;
        self.try_set(channel, map)
    }
}

fn reload(path: &Path, inner: &Mutex<FileInner>) {
    let fresh = match NamesDocument::load_from_file(path) {
        Ok(document) => document,
        Err(e) => {
            warn!("Failed to reload names file (keeping previous maps): {}", e);
            return;
        }
    };

    let handlers: Vec<ChangeHandler> = {
        let mut inner = inner.lock();
        let changed: Vec<ChannelType> = ChannelType::all()
            .iter()
            .copied()
            .filter(|channel| inner.document.get(*channel) != fresh.get(*channel))
            .collect();
        inner.document = fresh;
        changed
            .into_iter()
            .flat_map(|channel| {
                debug!("Names map changed on disk: {}", channel.settings_key());
                inner.handlers_for(channel)
            })
            .collect()
    };

    for handler in handlers {
        handler();
    }
}

impl NamesStore for FileNamesStore {
    fn get(&self, channel: ChannelType) -> Option<NamesMap> {
        self.inner.lock().document.get(channel).cloned()
    }

    fn set(&self, channel: ChannelType, map: NamesMap) {
        if let Err(e) = self.try_set(channel, map) {
            warn!("Failed to persist {}: {}", channel.settings_key(), e);
        }
    }

    fn subscribe(&self, channel: ChannelType, handler: ChangeHandler) -> SubscriptionId {
        self.inner.lock().subscribers.subscribe((channel, handler))
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.lock().subscribers.unsubscribe(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn map(entries: &[(&str, &str)]) -> NamesMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileNamesStore::open(dir.path().join("names.json")).unwrap();

        assert_eq!(store.get(ChannelType::Output), None);
        assert_eq!(store.get(ChannelType::Input), None);
    }

    #[test]
    fn test_set_persists_and_reopens() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("names.json");
        let store = FileNamesStore::open(&path).unwrap();

        store
            .try_set(ChannelType::Output, map(&[("Speakers", "Living Room")]))
            .unwrap();

        let reopened = FileNamesStore::open(&path).unwrap();
        assert_eq!(
            reopened.get(ChannelType::Output),
            Some(map(&[("Speakers", "Living Room")]))
        );
        assert_eq!(reopened.get(ChannelType::Input), None);

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("output-names-map"));
        assert!(!raw.contains("input-names-map"));
    }

    #[test]
    fn test_set_validated_rejects_without_writing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("names.json");
        let store = FileNamesStore::open(&path).unwrap();

        let err = store
            .set_validated(ChannelType::Output, map(&[("Speakers", "Mic"), ("USB Mic", "Mic")]))
            .unwrap_err();

        assert!(matches!(err, StoreError::Validation(ValidationError::DuplicateName(_))));
        assert_eq!(err.to_string(), "Devices need to have unique names");
        assert!(!path.exists());
        assert_eq!(store.get(ChannelType::Output), None);
    }

    #[test]
    fn test_reload_notifies_changed_channel_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("names.json");
        let store = FileNamesStore::open(&path).unwrap();
        store
            .try_set(ChannelType::Output, map(&[("Speakers", "Speakers")]))
            .unwrap();

        let outputs = Arc::new(AtomicUsize::new(0));
        let inputs = Arc::new(AtomicUsize::new(0));
        let counter = outputs.clone();
        store.subscribe(
            ChannelType::Output,
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let counter = inputs.clone();
        store.subscribe(
            ChannelType::Input,
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        // Another process rewrites the file
        let other = FileNamesStore::open(&path).unwrap();
        other
            .try_set(ChannelType::Output, map(&[("Speakers", "Living Room")]))
            .unwrap();

        store.reload();
        assert_eq!(outputs.load(Ordering::SeqCst), 1);
        assert_eq!(inputs.load(Ordering::SeqCst), 0);
        assert_eq!(
            store.get(ChannelType::Output),
            Some(map(&[("Speakers", "Living Room")]))
        );

        // Nothing changed on disk, nothing to notify
        store.reload();
        assert_eq!(outputs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_corrupt_file_keeps_previous_maps() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("names.json");
        let store = FileNamesStore::open(&path).unwrap();
        store
            .try_set(ChannelType::Input, map(&[("USB Mic", "Podcast Mic")]))
            .unwrap();

        fs::write(&path, "{ not json").unwrap();
        store.reload();

        assert_eq!(
            store.get(ChannelType::Input),
            Some(map(&[("USB Mic", "Podcast Mic")]))
        );
    }

    #[tokio::test]
    async fn test_watch_picks_up_external_edit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("names.json");
        let store = FileNamesStore::open(&path).unwrap();
        store
            .try_set(ChannelType::Output, map(&[("Speakers", "Speakers")]))
            .unwrap();
        store.watch().unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        store.subscribe(
            ChannelType::Output,
            Arc::new(move || {
                let _ = tx.send(());
            }),
        );

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let other = FileNamesStore::open(&path).unwrap();
        other
            .try_set(ChannelType::Output, map(&[("Speakers", "Kitchen")]))
            .unwrap();

        let notified =
            tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv()).await;
        if notified.is_ok() {
            assert_eq!(
                store.get(ChannelType::Output),
                Some(map(&[("Speakers", "Kitchen")]))
            );
        }
        store.unwatch();
    }
}
