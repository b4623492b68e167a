//! Typed progress document for running public events.
//!
//! The combat engine reports progress and the UI reads it back, so the
//! shape is a closed key set with typed values instead of a free-form map.
//! The document carries a schema version; a reader that sees a newer
//! version than it understands should refuse to interpret it.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Current version of the progress document layout.
pub const PROGRESS_SCHEMA_VERSION: u32 = 1;

/// Known progress counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ProgressKey {
    Kills,
    Collected,
    Escorted,
    Defended,
    Interactions,
    BossHealth,
    /// Per-objective counter, keyed by objective index
    Objective(u8),
}

impl fmt::Display for ProgressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kills => write!(f, "kills"),
            Self::Collected => write!(f, "collected"),
            Self::Escorted => write!(f, "escorted"),
            Self::Defended => write!(f, "defended"),
            Self::Interactions => write!(f, "interactions"),
            Self::BossHealth => write!(f, "boss_health"),
            Self::Objective(index) => write!(f, "objective_{index}"),
        }
    }
}

impl FromStr for ProgressKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kills" => Ok(Self::Kills),
            "collected" => Ok(Self::Collected),
            "escorted" => Ok(Self::Escorted),
            "defended" => Ok(Self::Defended),
            "interactions" => Ok(Self::Interactions),
            "boss_health" => Ok(Self::BossHealth),
            other => other
                .strip_prefix("objective_")
                .and_then(|index| index.parse::<u8>().ok())
                .map(Self::Objective)
                .ok_or_else(|| DomainError::validation(format!("Unknown progress key: {other}"))),
        }
    }
}

impl From<ProgressKey> for String {
    fn from(key: ProgressKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for ProgressKey {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Typed progress value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ProgressValue {
    Count(u32),
    /// 0.0..=100.0
    Percent(f32),
    Flag(bool),
}

/// Progress for one event instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventProgress {
    schema_version: u32,
    entries: BTreeMap<ProgressKey, ProgressValue>,
}

impl Default for EventProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl EventProgress {
    pub fn new() -> Self {
        Self {
            schema_version: PROGRESS_SCHEMA_VERSION,
            entries: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: ProgressKey, value: ProgressValue) -> Self {
        self.entries.insert(key, value);
        self
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub fn get(&self, key: ProgressKey) -> Option<ProgressValue> {
        self.entries.get(&key).copied()
    }

    pub fn entries(&self) -> &BTreeMap<ProgressKey, ProgressValue> {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn set(&mut self, key: ProgressKey, value: ProgressValue) {
        self.entries.insert(key, value);
    }

    /// Shallow merge: every key in `other` replaces the stored value,
    /// keys absent from `other` are kept.
    pub fn merge(&mut self, other: &EventProgress) -> Result<(), DomainError> {
        if other.schema_version > self.schema_version {
            return Err(DomainError::validation(format!(
                "Progress schema version {} is newer than supported version {}",
                other.schema_version, self.schema_version
            )));
        }
        for (key, value) in &other.entries {
            self.entries.insert(*key, *value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_replaces_given_keys_and_keeps_the_rest() {
        let mut progress = EventProgress::new()
            .with(ProgressKey::Kills, ProgressValue::Count(4))
            .with(ProgressKey::BossHealth, ProgressValue::Percent(80.0));

        let update = EventProgress::new()
            .with(ProgressKey::Kills, ProgressValue::Count(9))
            .with(ProgressKey::Objective(2), ProgressValue::Flag(true));

        progress.merge(&update).expect("merge");

        assert_eq!(progress.get(ProgressKey::Kills), Some(ProgressValue::Count(9)));
        assert_eq!(
            progress.get(ProgressKey::BossHealth),
            Some(ProgressValue::Percent(80.0))
        );
        assert_eq!(
            progress.get(ProgressKey::Objective(2)),
            Some(ProgressValue::Flag(true))
        );
    }

    #[test]
    fn merge_rejects_newer_schema() {
        let mut progress = EventProgress::new();
        let mut newer = EventProgress::new();
        newer.schema_version = PROGRESS_SCHEMA_VERSION + 1;
        assert!(matches!(
            progress.merge(&newer),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn keys_parse_from_their_display_form() {
        for key in [
            ProgressKey::Kills,
            ProgressKey::Defended,
            ProgressKey::BossHealth,
            ProgressKey::Objective(17),
        ] {
            assert_eq!(key.to_string().parse::<ProgressKey>(), Ok(key));
        }
        assert!("objective_x".parse::<ProgressKey>().is_err());
        assert!("gold".parse::<ProgressKey>().is_err());
    }

    #[test]
    fn document_serializes_with_string_keys() {
        let progress = EventProgress::new().with(ProgressKey::Objective(0), ProgressValue::Count(3));
        let json = serde_json::to_value(&progress).expect("serialize");
        assert_eq!(json["schemaVersion"], 1);
        assert_eq!(json["entries"]["objective_0"]["type"], "count");
        assert_eq!(json["entries"]["objective_0"]["value"], 3);

        let back: EventProgress = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, progress);
    }
}
