//! Name propagator - pushes rename instructions onto live surfaces
//!
//! Matching is done on the currently displayed text, not on device ids: the
//! surfaces are not guaranteed to expose ids, but their label text is always
//! addressable. A label that matches nothing is left alone; that is the
//! normal case for devices not shown on a given surface.

use std::sync::Arc;
use tracing::{debug, trace};

use super::diff::UpdateType;
use crate::settings::{ChannelType, NamesMap};
use crate::surface::{DeviceListSurface, Label, LabelCollection};

/// Rename every label whose text matches an update's `old_name`
///
/// The first matching update wins for each label. Returns how many labels
/// changed text.
pub fn apply_to_labels(labels: &[Label], updates: &[UpdateType]) -> usize {
    if updates.is_empty() {
        return 0;
    }

    let mut changed = 0;
    for label in labels {
        let current = label.text();
        let Some(update) = updates.iter().find(|u| u.old_name == current) else {
            continue;
        };
        if update.new_name != current {
            label.set_text(update.new_name.as_str());
            changed += 1;
        }
    }
    changed
}

/// Rename the first label showing `old_name`; returns whether one was found
pub fn rename_first(labels: &[Label], old_name: &str, new_name: &str) -> bool {
    match labels.iter().find(|label| label.text() == old_name) {
        Some(label) => {
            label.set_text(new_name);
            true
        }
        None => false,
    }
}

/// One pass of first-found renames over a fixed label set
///
/// Matching is against the text each label showed when the pass started,
/// and a label is claimed by at most one rename, so `A -> B, B -> C` never
/// chains and swaps land in one step.
struct RenamePass<'a> {
    labels: &'a [Label],
    texts: Vec<String>,
    claimed: Vec<bool>,
}

impl<'a> RenamePass<'a> {
    fn new(labels: &'a [Label]) -> Self {
        Self {
            labels,
            texts: labels.iter().map(Label::text).collect(),
            claimed: vec![false; labels.len()],
        }
    }

    fn rename_first(&mut self, old_name: &str, new_name: &str) -> bool {
        let found = self
            .texts
            .iter()
            .zip(self.claimed.iter())
            .position(|(text, claimed)| !claimed && text == old_name);
        match found {
            Some(index) => {
                self.claimed[index] = true;
                self.labels[index].set_text(new_name);
                true
            }
            None => false,
        }
    }
}

/// Applies updates to the panel device lists and the third-party label grid
#[derive(Clone)]
pub struct NamePropagator {
    panel: Arc<dyn DeviceListSurface>,
    tweaker: Arc<dyn LabelCollection>,
}

impl NamePropagator {
    pub fn new(panel: Arc<dyn DeviceListSurface>, tweaker: Arc<dyn LabelCollection>) -> Self {
        Self { panel, tweaker }
    }

    pub fn tweaker(&self) -> &Arc<dyn LabelCollection> {
        &self.tweaker
    }

    /// Apply updates to the rendered device entries of one channel
    pub fn apply_update(&self, updates: &[UpdateType], channel: ChannelType) {
        let labels = self.panel.device_labels(channel);
        let changed = apply_to_labels(&labels, updates);
        if changed > 0 {
            debug!("Renamed {} {} panel entries", changed, channel);
        } else {
            trace!("No {} panel entry matched {} updates", channel, updates.len());
        }
    }

    /// Rename a single third-party label
    pub fn rename_tweaker_label(&self, old_name: &str, new_name: &str) -> bool {
        let renamed = rename_first(&self.tweaker.labels(), old_name, new_name);
        if renamed {
            debug!("Renamed integration label '{}' -> '{}'", old_name, new_name);
        }
        renamed
    }

    /// Apply each update to at most one third-party label, and each label
    /// at most once
    pub fn apply_tweaker_update(&self, updates: &[UpdateType]) {
        let labels = self.tweaker.labels();
        let mut pass = RenamePass::new(&labels);
        for update in updates.iter().filter(|u| !u.is_identity()) {
            if pass.rename_first(&update.old_name, &update.new_name) {
                debug!(
                    "Renamed integration label '{}' -> '{}'",
                    update.old_name, update.new_name
                );
            }
        }
    }

    /// Put provider names back on the third-party labels
    ///
    /// The integration shows one active device per channel, so at most one
    /// label per map is restored.
    pub fn restore_tweaker(&self, outputs: &NamesMap, inputs: &NamesMap) {
        let labels = self.tweaker.labels();
        let mut pass = RenamePass::new(&labels);
        for map in [outputs, inputs] {
            for (original, custom) in map {
                if pass.rename_first(custom, original) {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{AudioPanel, LabelGrid};

    fn labels(texts: &[&str]) -> Vec<Label> {
        texts.iter().map(|t| Label::new(*t)).collect()
    }

    fn texts(labels: &[Label]) -> Vec<String> {
        labels.iter().map(Label::text).collect()
    }

    #[test]
    fn test_apply_renames_matching_labels_only() {
        let labels = labels(&["USB Mic", "Webcam Mic"]);

        let changed = apply_to_labels(&labels, &[UpdateType::new("USB Mic", "Podcast Mic")]);

        assert_eq!(changed, 1);
        assert_eq!(texts(&labels), vec!["Podcast Mic", "Webcam Mic"]);
    }

    #[test]
    fn test_first_matching_update_wins_and_no_chaining() {
        let labels = labels(&["A"]);

        apply_to_labels(
            &labels,
            &[
                UpdateType::new("A", "B"),
                UpdateType::new("A", "C"),
                UpdateType::new("B", "D"),
            ],
        );

        assert_eq!(texts(&labels), vec!["B"]);
    }

    #[test]
    fn test_swap_renames_in_one_pass() {
        let labels = labels(&["Left", "Right"]);

        apply_to_labels(
            &labels,
            &[UpdateType::new("Left", "Right"), UpdateType::new("Right", "Left")],
        );

        assert_eq!(texts(&labels), vec!["Right", "Left"]);
    }

    #[test]
    fn test_rename_first_touches_one_label() {
        let labels = labels(&["Speakers", "Speakers"]);

        assert!(rename_first(&labels, "Speakers", "Living Room"));
        assert!(!rename_first(&labels, "Headphones", "Cans"));

        assert_eq!(texts(&labels), vec!["Living Room", "Speakers"]);
    }

    #[test]
    fn test_single_state_then_reverse_round_trips() {
        use crate::sync::diff::{generate_update_from_single_state, reverse_names_map};

        let panel = AudioPanel::new();
        panel.insert_device(ChannelType::Output, 1, "Speakers");
        panel.insert_device(ChannelType::Output, 2, "HDMI Output");
        panel.insert_device(ChannelType::Output, 3, "Bluetooth");
        let before = panel.label_texts(ChannelType::Output);

        let propagator = NamePropagator::new(Arc::new(panel.clone()), Arc::new(LabelGrid::ready()));
        let map: NamesMap = [("Speakers", "Living Room"), ("HDMI Output", "TV")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        propagator.apply_update(&generate_update_from_single_state(&map), ChannelType::Output);
        assert_eq!(
            panel.label_texts(ChannelType::Output),
            vec!["Living Room", "TV", "Bluetooth"]
        );

        propagator.apply_update(
            &generate_update_from_single_state(&reverse_names_map(&map)),
            ChannelType::Output,
        );
        assert_eq!(panel.label_texts(ChannelType::Output), before);
    }

    #[test]
    fn test_restore_tweaker_one_label_per_channel() {
        let grid = LabelGrid::ready();
        grid.add_label("Volume");
        grid.add_label("Living Room");
        grid.add_label("Podcast Mic");
        let propagator = NamePropagator::new(Arc::new(AudioPanel::new()), Arc::new(grid.clone()));

        let outputs: NamesMap = [("Speakers".to_string(), "Living Room".to_string())].into();
        let inputs: NamesMap = [("USB Mic".to_string(), "Podcast Mic".to_string())].into();
        propagator.restore_tweaker(&outputs, &inputs);

        assert_eq!(grid.texts(), vec!["Volume", "Speakers", "USB Mic"]);
    }

    fn grid_propagator(texts: &[&str]) -> (LabelGrid, NamePropagator) {
        let grid = LabelGrid::ready();
        for text in texts {
            grid.add_label(*text);
        }
        let propagator = NamePropagator::new(Arc::new(AudioPanel::new()), Arc::new(grid.clone()));
        (grid, propagator)
    }

    #[test]
    fn test_tweaker_update_does_not_chain() {
        use crate::sync::diff::generate_update_from_single_state;

        let (grid, propagator) = grid_propagator(&["A"]);
        let map: NamesMap = [("A", "B"), ("B", "C")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        propagator.apply_tweaker_update(&generate_update_from_single_state(&map));

        assert_eq!(grid.texts(), vec!["B"]);
    }

    #[test]
    fn test_tweaker_update_swaps_in_one_pass() {
        let (grid, propagator) = grid_propagator(&["Left"]);

        propagator.apply_tweaker_update(&[
            UpdateType::new("Left", "Right"),
            UpdateType::new("Right", "Left"),
        ]);

        assert_eq!(grid.texts(), vec!["Right"]);
    }

    #[test]
    fn test_tweaker_update_renames_one_label_per_update() {
        let (grid, propagator) = grid_propagator(&["Speakers", "Speakers"]);

        propagator.apply_tweaker_update(&[UpdateType::new("Speakers", "Living Room")]);

        assert_eq!(grid.texts(), vec!["Living Room", "Speakers"]);
    }
}
