//! Persisted names maps - one `OriginalName -> CustomName` map per channel type
//!
//! The engine only relies on the [`NamesStore`] capability: get, set and
//! per-channel change notification. Two backends are provided, an in-memory
//! store for tests and simulation, and a JSON file store that also notices
//! edits made by another process (the preferences CLI).

mod file;
mod memory;
mod types;
pub mod validation;
mod watcher;

pub use file::{FileNamesStore, NamesDocument, StoreError};
pub use memory::MemoryNamesStore;
pub use types::{ChannelType, CustomName, NamesMap, NamesStore, OriginalName};
pub use validation::{validate, ValidationError};
pub use watcher::NamesFileWatcher;
