//! Diff generator - pure functions producing rename instructions between names maps

use serde::{Deserialize, Serialize};

use crate::settings::NamesMap;

/// A single rename instruction; the unit of propagation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UpdateType {
    pub old_name: String,
    pub new_name: String,
}

impl UpdateType {
    pub fn new(old_name: impl Into<String>, new_name: impl Into<String>) -> Self {
        Self {
            old_name: old_name.into(),
            new_name: new_name.into(),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.old_name == self.new_name
    }
}

/// Renames needed to move the surfaces from `current` to `desired`
///
/// Keys missing from `current` produce nothing: there is no displayed text
/// to rename from. Order follows `desired`'s keys.
pub fn generate_diff_update(current: &NamesMap, desired: &NamesMap) -> Vec<UpdateType> {
    desired
        .iter()
        .filter_map(|(original, wanted)| match current.get(original) {
            Some(applied) if applied != wanted => Some(UpdateType::new(applied, wanted)),
            _ => None,
        })
        .collect()
}

/// One `original -> custom` update per key, regardless of what was applied before
pub fn generate_update_from_single_state(state: &NamesMap) -> Vec<UpdateType> {
    state
        .iter()
        .map(|(original, custom)| UpdateType::new(original, custom))
        .collect()
}

/// Swap keys and values
///
/// When several keys share a value only the last one in key order survives.
pub fn reverse_names_map(map: &NamesMap) -> NamesMap {
    map.iter()
        .map(|(original, custom)| (custom.clone(), original.clone()))
        .collect()
}
