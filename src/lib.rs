//! Audio Device Renamer
//!
//! Persistent custom names for audio input/output devices shown in the
//! desktop quick-settings panel. The [`sync::SyncEngine`] keeps those names
//! on every surface that renders a device name while the persisted maps,
//! the live device lists and the active devices change independently, and
//! puts the provider names back when it is disabled.

pub mod config;
pub mod mixer;
pub mod settings;
pub mod subscription;
pub mod surface;
pub mod sync;
