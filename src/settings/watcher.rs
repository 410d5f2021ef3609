//! Names file watcher - notices when another process rewrites the names file

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::subscription::ChangeHandler;

/// Window in which a burst of file events collapses into one notification
const DEBOUNCE: Duration = Duration::from_millis(100);

/// Watches the directory holding the names file and fires `on_change`
/// whenever the file is created, modified or replaced by a rename.
///
/// The parent directory is watched rather than the file itself because the
/// store writes atomically (temp file + rename), which replaces the inode.
pub struct NamesFileWatcher {
    _watcher: RecommendedWatcher,
}

impl NamesFileWatcher {
    pub fn spawn(path: &Path, on_change: ChangeHandler) -> Result<Self> {
        let file_name: OsString = path
            .file_name()
            .map(|name| name.to_os_string())
            .with_context(|| format!("Names file path has no file name: {}", path.display()))?;
        let dir: PathBuf = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        // notify callbacks run on their own OS thread; when a runtime is
        // around, debounce on it instead of blocking that thread
        let runtime_handle = tokio::runtime::Handle::try_current().ok();
        // Set while a notification is scheduled; later events in the window ride along
        let pending = Arc::new(AtomicBool::new(false));

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                        return;
                    }
                    let touches_file = event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == Some(file_name.as_os_str()));
                    if !touches_file {
                        return;
                    }

                    debug!("Names file event: {:?}", event.kind);
                    match &runtime_handle {
                        Some(handle) => {
                            if pending.swap(true, Ordering::SeqCst) {
                                return;
                            }
                            let on_change = on_change.clone();
                            let pending = pending.clone();
                            handle.spawn(async move {
                                tokio::time::sleep(DEBOUNCE).await;
                                pending.store(false, Ordering::SeqCst);
                                on_change();
                            });
                        }
                        None => on_change(),
                    }
                }
                Err(e) => {
                    error!("Watch error: {}", e);
                }
            }
        })?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch names directory: {}", dir.display()))?;

        info!("Names file watcher started for: {}", path.display());

        Ok(Self { _watcher: watcher })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_burst_of_writes_notifies_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("names.json");
        std::fs::write(&path, "{}").unwrap();

        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let _watcher = NamesFileWatcher::spawn(
            &path,
            Arc::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();

        for i in 0..3 {
            std::fs::write(&path, format!("{{\"output-names-map\":{{\"Speakers\":\"{}\"}}}}", i)).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_other_files_in_directory_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("names.json");

        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let _watcher = NamesFileWatcher::spawn(
            &path,
            Arc::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();

        std::fs::write(dir.path().join("unrelated.txt"), "x").unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
