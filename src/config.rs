//! Configuration management for the audio device renamer
//!
//! Handles loading, validating and saving the YAML configuration file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::mixer::DeviceId;
use crate::settings::ChannelType;

/// Directory name used under the OS data directory
const APP_DIR: &str = "audio-device-renamer";

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Location of the persisted names maps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub names_file: Option<PathBuf>,
    #[serde(default)]
    pub engine: EngineConfig,
    /// Devices the `simulate` command pretends are connected
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<DeviceConfig>,
}

/// Synchronization engine tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub growth_detection: GrowthDetection,
    /// Settle delay after the mixer reports ready
    #[serde(default = "default_mixer_settle_ms")]
    pub mixer_settle_ms: u64,
    /// Delay before reacting to an active-device change
    #[serde(default = "default_active_device_settle_ms")]
    pub active_device_settle_ms: u64,
    #[serde(default)]
    pub tweaker_readiness: BackoffConfig,
}

/// How growth of the rendered device lists is detected
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(tag = "strategy", rename_all = "lowercase")]
pub enum GrowthDetection {
    /// Wrap the device list so insertions notify
    #[default]
    Observable,
    /// Poll the device count
    Polling {
        #[serde(default = "default_poll_interval_ms")]
        interval_ms: u64,
    },
}

/// Bounded retry-with-backoff used while waiting for the integration to render
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct BackoffConfig {
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// Simulated device
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DeviceConfig {
    pub id: DeviceId,
    pub name: String,
    pub channel: ChannelType,
    #[serde(default)]
    pub active: bool,
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Load the file if it exists, defaults otherwise
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;

        let mut seen = std::collections::HashSet::new();
        for device in &self.devices {
            if device.name.is_empty() {
                anyhow::bail!("Device {} name cannot be empty", device.id);
            }
            if !seen.insert((device.channel, device.id)) {
                anyhow::bail!("Duplicate {} device id {}", device.channel, device.id);
            }
        }

        for channel in ChannelType::all() {
            let active = self
                .devices
                .iter()
                .filter(|d| d.channel == *channel && d.active)
                .count();
            if active > 1 {
                anyhow::bail!("At most one {} device can be active", channel);
            }
        }

        Ok(())
    }

    /// Names file from config, or the per-user default
    pub fn names_file_path(&self) -> PathBuf {
        self.names_file.clone().unwrap_or_else(default_names_file)
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if let GrowthDetection::Polling { interval_ms } = self.growth_detection {
            if interval_ms == 0 {
                anyhow::bail!("Polling interval must be greater than 0 ms");
            }
        }

        let backoff = &self.tweaker_readiness;
        if backoff.max_attempts == 0 {
            anyhow::bail!("tweaker_readiness.max_attempts must be at least 1");
        }
        if backoff.initial_backoff_ms > backoff.max_backoff_ms {
            anyhow::bail!(
                "tweaker_readiness.initial_backoff_ms ({}) exceeds max_backoff_ms ({})",
                backoff.initial_backoff_ms,
                backoff.max_backoff_ms
            );
        }

        Ok(())
    }

    pub fn mixer_settle(&self) -> Duration {
        Duration::from_millis(self.mixer_settle_ms)
    }

    pub fn active_device_settle(&self) -> Duration {
        Duration::from_millis(self.active_device_settle_ms)
    }

    /// No settle delays and a tiny backoff; used by tests
    pub fn immediate() -> Self {
        Self {
            growth_detection: GrowthDetection::Observable,
            mixer_settle_ms: 0,
            active_device_settle_ms: 0,
            tweaker_readiness: BackoffConfig {
                initial_backoff_ms: 1,
                max_backoff_ms: 4,
                max_attempts: 3,
            },
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            growth_detection: GrowthDetection::default(),
            mixer_settle_ms: default_mixer_settle_ms(),
            active_device_settle_ms: default_active_device_settle_ms(),
            tweaker_readiness: BackoffConfig::default(),
        }
    }
}

impl BackoffConfig {
    /// Delay before attempt `attempt` (0-based), doubling up to the cap
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.min(32)).unwrap_or(u64::MAX);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// `<data dir>/audio-device-renamer/names.json`
pub fn default_names_file() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("names.json")
}

// Default value functions
fn default_mixer_settle_ms() -> u64 { 200 }
fn default_active_device_settle_ms() -> u64 { 200 }
fn default_poll_interval_ms() -> u64 { 500 }
fn default_initial_backoff_ms() -> u64 { 50 }
fn default_max_backoff_ms() -> u64 { 1000 }
fn default_max_attempts() -> u32 { 8 }
