//! Command handlers for the preferences and simulation subcommands

use anyhow::{Context, Result};
use colored::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use audio_device_renamer::config::AppConfig;
use audio_device_renamer::mixer::{MemoryMixer, MemoryMixerSource};
use audio_device_renamer::settings::{ChannelType, FileNamesStore, NamesMap, NamesStore};
use audio_device_renamer::surface::{AudioPanel, LabelGrid};
use audio_device_renamer::sync::{Collaborators, EngineState, SyncEngine};

/// Print `original -> custom` rows for one or both channels
pub fn list(store: &FileNamesStore, channel: Option<ChannelType>) {
    let channels: Vec<ChannelType> = match channel {
        Some(channel) => vec![channel],
        None => ChannelType::all().to_vec(),
    };

    println!("{}", format!("Names file: {}", store.path().display()).dimmed());
    for channel in channels {
        println!("\n{}", channel.settings_key().bold().cyan());
        match store.get(channel) {
            Some(map) if !map.is_empty() => {
                for (original, custom) in &map {
                    if original == custom {
                        println!("  {}", original);
                    } else {
                        println!("  {} -> {}", original, custom.green());
                    }
                }
            }
            _ => println!("  {}", "(no devices seen yet)".dimmed()),
        }
    }
}

/// Set the custom name of `original`, creating the entry if needed
pub fn with_rename(map: &NamesMap, original: &str, custom: &str) -> NamesMap {
    let mut map = map.clone();
    map.insert(original.to_string(), custom.to_string());
    map
}

/// Map `original` back to itself
pub fn with_reset(map: &NamesMap, original: &str) -> NamesMap {
    with_rename(map, original, original)
}

pub fn rename(store: &FileNamesStore, channel: ChannelType, original: &str, custom: &str) -> Result<()> {
    let current = store.get(channel).unwrap_or_default();
    let map = with_rename(&current, original, custom);

    store
        .set_validated(channel, map)
        .with_context(|| format!("Cannot rename {} device '{}'", channel, original))?;

    println!("{} {} -> {}", "Renamed".green(), original, custom.bold());
    Ok(())
}

pub fn reset(store: &FileNamesStore, channel: ChannelType, original: &str) -> Result<()> {
    let current = store.get(channel).unwrap_or_default();
    if !current.contains_key(original) {
        println!("{} '{}' is not a known {} device", "Note:".yellow(), original, channel);
    }

    store
        .try_set(channel, with_reset(&current, original))
        .with_context(|| format!("Cannot reset {} device '{}'", channel, original))?;

    println!("{} {}", "Reset".green(), original);
    Ok(())
}

/// Run the engine against an in-memory host until `shutdown` resolves
pub async fn simulate(
    config: &AppConfig,
    store: FileNamesStore,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    if config.devices.is_empty() {
        warn!("No devices configured; only renames of devices added later will show");
    }

    let mixer = MemoryMixer::new();
    let panel = AudioPanel::new();
    let grid = LabelGrid::new();
    grid.add_label("Volume");

    for device in &config.devices {
        mixer.add_device(device.id, device.name.as_str(), device.channel);
        panel.insert_device(device.channel, device.id, device.name.as_str());
        if device.active {
            grid.add_label(device.name.as_str());
        }
    }

    store
        .watch()
        .with_context(|| format!("Failed to watch names file: {}", store.path().display()))?;

    let handle = SyncEngine::spawn(
        Collaborators {
            store: Arc::new(store.clone()),
            mixer_source: Arc::new(MemoryMixerSource::new(
                mixer.clone(),
                config.engine.mixer_settle(),
            )),
            panel: Arc::new(panel.clone()),
            tweaker: Arc::new(grid.clone()),
        },
        config.engine.clone(),
    );

    handle.enable();
    mixer.mark_ready();
    grid.set_ready(true);

    let mut snapshot = LabelSnapshot::capture(&panel, &grid);
    snapshot.print();

    let mut announced = false;
    let mut ticker = tokio::time::interval(Duration::from_millis(250));
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                if !announced && handle.state() == EngineState::Active {
                    announced = true;
                    info!("Edit {} (or use the rename command) to see names change", store.path().display());
                    for device in config.devices.iter().filter(|d| d.active) {
                        mixer.set_active(device.channel, device.id);
                    }
                }

                let current = LabelSnapshot::capture(&panel, &grid);
                current.log_changes_from(&snapshot);
                snapshot = current;
            }
        }
    }

    handle.shutdown().await;
    store.unwatch();

    let restored = LabelSnapshot::capture(&panel, &grid);
    restored.log_changes_from(&snapshot);
    println!("\n{}", "Provider names restored".bold());
    restored.print();

    Ok(())
}

/// Texts currently shown on every surface
#[derive(Debug, PartialEq)]
struct LabelSnapshot {
    panel: Vec<(ChannelType, Vec<String>)>,
    grid: Vec<String>,
}

impl LabelSnapshot {
    fn capture(panel: &AudioPanel, grid: &LabelGrid) -> Self {
        Self {
            panel: ChannelType::all()
                .iter()
                .map(|channel| (*channel, panel.label_texts(*channel)))
                .collect(),
            grid: grid.texts(),
        }
    }

    fn log_changes_from(&self, previous: &LabelSnapshot) {
        for ((channel, now), (_, before)) in self.panel.iter().zip(previous.panel.iter()) {
            for (old, new) in before.iter().zip(now.iter()).filter(|(a, b)| a != b) {
                info!("Panel {}: '{}' -> '{}'", channel, old, new);
            }
        }
        for (old, new) in previous.grid.iter().zip(self.grid.iter()).filter(|(a, b)| a != b) {
            info!("Integration label: '{}' -> '{}'", old, new);
        }
        if self != previous {
            debug!("Surfaces now: {:?}", self);
        }
    }

    fn print(&self) {
        for (channel, texts) in &self.panel {
            println!("{} {}", format!("{:>7}:", channel).cyan(), texts.join(", "));
        }
        println!("{} {}", "   grid:".cyan(), self.grid.join(", "));
    }
}
