//! Validation of proposed custom-name maps before they are persisted

use std::collections::HashSet;
use thiserror::Error;

use super::types::NamesMap;

/// Reason a proposed names map was rejected. `Display` is the user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Device name cannot be empty")]
    EmptyName,
    #[error("Devices need to have unique names")]
    DuplicateName(String),
}

/// Check that every custom name is non-empty and unique within the map
///
/// Names made only of whitespace count as empty. Empty names are reported
/// before duplicates.
pub fn validate(map: &NamesMap) -> Result<(), ValidationError> {
    if map.values().any(|custom| custom.trim().is_empty()) {
        return Err(ValidationError::EmptyName);
    }

    let mut seen = HashSet::with_capacity(map.len());
    for custom in map.values() {
        if !seen.insert(custom.as_str()) {
            return Err(ValidationError::DuplicateName(custom.clone()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &str)]) -> NamesMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_valid_map() {
        assert_eq!(validate(&map(&[("Speakers", "Living Room"), ("USB Mic", "USB Mic")])), Ok(()));
        assert_eq!(validate(&NamesMap::new()), Ok(()));
    }

    #[test]
    fn test_duplicate_custom_names_rejected() {
        let err = validate(&map(&[("Speakers", "Mic"), ("USB Mic", "Mic")])).unwrap_err();
        assert_eq!(err, ValidationError::DuplicateName("Mic".to_string()));
        assert_eq!(err.to_string(), "Devices need to have unique names");
    }

    #[test]
    fn test_empty_custom_name_rejected() {
        let err = validate(&map(&[("Speakers", "")])).unwrap_err();
        assert_eq!(err, ValidationError::EmptyName);
        assert_eq!(err.to_string(), "Device name cannot be empty");
    }

    #[test]
    fn test_empty_reported_before_duplicates() {
        let err = validate(&map(&[("A", ""), ("B", ""), ("C", "x")])).unwrap_err();
        assert_eq!(err, ValidationError::EmptyName);
    }

    #[test]
    fn test_whitespace_only_name_counts_as_empty() {
        assert_eq!(validate(&map(&[("Speakers", "   ")])), Err(ValidationError::EmptyName));
    }
}
