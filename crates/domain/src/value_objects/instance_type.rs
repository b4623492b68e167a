use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of instanced content, which decides how its lockout expires.
///
/// Content data names types by string. Strings are resolved into this
/// closed set once, when the catalog is loaded; anything unknown becomes
/// `Unrecognized` so the daily-reset fallback is a visible decision rather
/// than a silent default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceType {
    Raid,
    Dungeon,
    Expedition,
    Adventure,
    Unrecognized,
}

impl InstanceType {
    /// Resolve a content-data type name. Never fails; check
    /// [`InstanceType::is_recognized`] to report the fallback.
    pub fn parse(raw: &str) -> InstanceType {
        match raw.trim().to_ascii_lowercase().as_str() {
            "raid" => InstanceType::Raid,
            "dungeon" => InstanceType::Dungeon,
            "expedition" => InstanceType::Expedition,
            "adventure" => InstanceType::Adventure,
            _ => InstanceType::Unrecognized,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, InstanceType::Unrecognized)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            InstanceType::Raid => "Raid",
            InstanceType::Dungeon => "Dungeon",
            InstanceType::Expedition => "Expedition",
            InstanceType::Adventure => "Adventure",
            InstanceType::Unrecognized => "Unrecognized",
        }
    }
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
