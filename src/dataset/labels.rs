//! Fixed label sets for the two classification heads.
//!
//! Both sets are ordered: the position of a variant is the class index the
//! corresponding head predicts.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::utils::error::{GreenThumbError, Result};

/// Crop type, one of 10 fixed species
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Crop {
    Tomato,
    Potato,
    Rice,
    Wheat,
    Maize,
    Chili,
    Banana,
    Cotton,
    Apple,
    Grapes,
}

impl Crop {
    /// All crops in class-index order
    pub const ALL: [Crop; 10] = [
        Crop::Tomato,
        Crop::Potato,
        Crop::Rice,
        Crop::Wheat,
        Crop::Maize,
        Crop::Chili,
        Crop::Banana,
        Crop::Cotton,
        Crop::Apple,
        Crop::Grapes,
    ];

    pub const COUNT: usize = Self::ALL.len();

    /// Lowercase name, as used for dataset folders
    pub fn name(&self) -> &'static str {
        match self {
            Crop::Tomato => "tomato",
            Crop::Potato => "potato",
            Crop::Rice => "rice",
            Crop::Wheat => "wheat",
            Crop::Maize => "maize",
            Crop::Chili => "chili",
            Crop::Banana => "banana",
            Crop::Cotton => "cotton",
            Crop::Apple => "apple",
            Crop::Grapes => "grapes",
        }
    }

    /// Capitalized name for user-facing text
    pub fn display_name(&self) -> String {
        let name = self.name();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    /// Case-insensitive lookup
    pub fn from_name(name: &str) -> Option<Crop> {
        let lower = name.to_lowercase();
        Self::ALL.iter().copied().find(|c| c.name() == lower)
    }

    /// Like `from_name`, but an unknown name is a configuration error
    pub fn parse(name: &str) -> Result<Crop> {
        Self::from_name(name).ok_or_else(|| {
            GreenThumbError::Config(format!(
                "Unknown crop type '{}'. Must be one of: {}",
                name,
                crop_names().join(", ")
            ))
        })
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_index(index: usize) -> Option<Crop> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for Crop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Disease severity bucket, 0 (healthy) to 100 (dead)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Healthy,
    Minimal,
    Moderate,
    Severe,
    VerySevere,
    Dead,
}

impl Severity {
    /// All severities in class-index order
    pub const ALL: [Severity; 6] = [
        Severity::Healthy,
        Severity::Minimal,
        Severity::Moderate,
        Severity::Severe,
        Severity::VerySevere,
        Severity::Dead,
    ];

    pub const COUNT: usize = Self::ALL.len();

    /// Percentage of the plant affected
    pub fn level(&self) -> u32 {
        match self {
            Severity::Healthy => 0,
            Severity::Minimal => 20,
            Severity::Moderate => 40,
            Severity::Severe => 60,
            Severity::VerySevere => 80,
            Severity::Dead => 100,
        }
    }

    /// Human-readable disease status
    pub fn status(&self) -> &'static str {
        match self {
            Severity::Healthy => "Healthy",
            Severity::Minimal => "Minimal Disease (20%)",
            Severity::Moderate => "Moderate Disease (40%)",
            Severity::Severe => "Severe Disease (60%)",
            Severity::VerySevere => "Very Severe Disease (80%)",
            Severity::Dead => "Dead/Completely Affected (100%)",
        }
    }

    pub fn from_level(level: u32) -> Option<Severity> {
        Self::ALL.iter().copied().find(|s| s.level() == level)
    }

    /// Like `from_level`, but an out-of-set value is a configuration error
    pub fn parse_level(level: i64) -> Result<Severity> {
        u32::try_from(level)
            .ok()
            .and_then(Self::from_level)
            .ok_or_else(|| {
                GreenThumbError::Config(format!(
                    "Severity must be one of: {:?}, got {}",
                    severity_levels(),
                    level
                ))
            })
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_index(index: usize) -> Option<Severity> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.level())
    }
}

impl Serialize for Severity {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.level())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let level = u32::deserialize(deserializer)?;
        Severity::from_level(level)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid severity level {}", level)))
    }
}

/// Crop names in class-index order
pub fn crop_names() -> Vec<&'static str> {
    Crop::ALL.iter().map(|c| c.name()).collect()
}

/// Severity levels in class-index order
pub fn severity_levels() -> Vec<u32> {
    Severity::ALL.iter().map(|s| s.level()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_lookup_is_case_insensitive() {
        assert_eq!(Crop::from_name("Tomato"), Some(Crop::Tomato));
        assert_eq!(Crop::from_name("GRAPES"), Some(Crop::Grapes));
        assert_eq!(Crop::from_name("kale"), None);
        assert!(matches!(Crop::parse("kale"), Err(GreenThumbError::Config(_))));
    }

    #[test]
    fn test_crop_lookup_does_not_trim() {
        assert_eq!(Crop::from_name(" tomato "), None);
        assert_eq!(Crop::from_name("tomato\n"), None);
        assert!(matches!(Crop::parse(" potato"), Err(GreenThumbError::Config(_))));
    }

    #[test]
    fn test_crop_indices_follow_declaration_order() {
        for (i, crop) in Crop::ALL.iter().enumerate() {
            assert_eq!(crop.index(), i);
            assert_eq!(Crop::from_index(i), Some(*crop));
        }
        assert_eq!(Crop::from_index(10), None);
        assert_eq!(Crop::Maize.display_name(), "Maize");
    }

    #[test]
    fn test_every_severity_has_a_status() {
        let expected = [
            (0, "Healthy"),
            (20, "Minimal Disease (20%)"),
            (40, "Moderate Disease (40%)"),
            (60, "Severe Disease (60%)"),
            (80, "Very Severe Disease (80%)"),
            (100, "Dead/Completely Affected (100%)"),
        ];

        for (level, status) in expected {
            let severity = Severity::from_level(level).unwrap();
            assert_eq!(severity.status(), status);
            assert_eq!(severity.level(), level);
        }
    }

    #[test]
    fn test_out_of_set_severity_rejected() {
        assert_eq!(Severity::from_level(50), None);
        assert!(matches!(Severity::parse_level(-20), Err(GreenThumbError::Config(_))));
        assert!(matches!(Severity::parse_level(30), Err(GreenThumbError::Config(_))));
        assert_eq!(Severity::parse_level(80).unwrap(), Severity::VerySevere);
    }

    #[test]
    fn test_severity_serializes_as_level() {
        let json = serde_json::to_string(&Severity::Moderate).unwrap();
        assert_eq!(json, "40");
        let back: Severity = serde_json::from_str("100").unwrap();
        assert_eq!(back, Severity::Dead);
        assert!(serde_json::from_str::<Severity>("10").is_err());
    }
}
