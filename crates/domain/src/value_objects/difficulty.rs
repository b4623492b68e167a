use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

// =============================================================================
// Instance Difficulty
// =============================================================================

/// Difficulty a dungeon or raid run is entered at.
///
/// Lockouts are tracked per difficulty, so clearing Normal does not lock
/// the same instance on Veteran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceDifficulty {
    Normal,
    Veteran,
    /// Soft-lockout difficulty: re-entry allowed, rewards diminish
    Mythic,
}

impl InstanceDifficulty {
    pub fn display_name(&self) -> &'static str {
        match self {
            InstanceDifficulty::Normal => "Normal",
            InstanceDifficulty::Veteran => "Veteran",
            InstanceDifficulty::Mythic => "Mythic",
        }
    }

    pub fn is_soft_lockout(&self) -> bool {
        matches!(self, InstanceDifficulty::Mythic)
    }
}

impl fmt::Display for InstanceDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for InstanceDifficulty {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "veteran" => Ok(Self::Veteran),
            "mythic" => Ok(Self::Mythic),
            other => Err(DomainError::configuration(format!(
                "Unknown instance difficulty: {other}"
            ))),
        }
    }
}

// =============================================================================
// Public Event Scaling
// =============================================================================

/// Enemy scaling for a public event by participant count.
///
/// A step function rather than a curve so designers can predict and tune
/// the exact multiplier a group size gets.
pub fn event_difficulty_multiplier(participant_count: u32) -> f32 {
    match participant_count {
        0..=10 => 1.0,
        11..=25 => 1.5,
        26..=50 => 2.0,
        _ => 2.5,
    }
}
