use serde::{Deserialize, Serialize};

use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Interval,
    RandomWindow,
}

/// How a recurring event schedule re-arms after firing.
///
/// The schedule only stores this; deriving the next trigger time is the
/// job of a trigger policy outside the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerConfig {
    /// Fire every `minutes`
    Interval { minutes: u32 },
    /// Fire a random number of minutes in `[min_minutes, max_minutes]` later
    RandomWindow { min_minutes: u32, max_minutes: u32 },
}

impl TriggerConfig {
    pub fn trigger_type(&self) -> TriggerType {
        match self {
            TriggerConfig::Interval { .. } => TriggerType::Interval,
            TriggerConfig::RandomWindow { .. } => TriggerType::RandomWindow,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        match *self {
            TriggerConfig::Interval { minutes } if minutes == 0 => Err(
                DomainError::configuration("interval trigger needs a positive interval"),
            ),
            TriggerConfig::RandomWindow {
                min_minutes,
                max_minutes,
            } if min_minutes == 0 || min_minutes > max_minutes => {
                Err(DomainError::configuration(format!(
                    "random window trigger needs 0 < min <= max, got {min_minutes}..{max_minutes}"
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Whether a schedule that has never been armed counts as due.
///
/// A schedule with no `next_trigger_at` is "not yet computed", which is a
/// different thing from "due now". This policy makes the choice explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnarmedSchedulePolicy {
    /// New schedules fire on the first sweep after creation
    #[default]
    FireImmediately,
    /// New schedules wait until something arms them with a first time
    WaitForArm,
}
