//! Lockout expiry dispatch and soft-lockout diminishing returns.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::reset_clock::ResetClock;
use crate::value_objects::{InstanceDifficulty, InstanceType};

/// Which rule produced a lockout's expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryRule {
    WeeklyReset,
    DailyReset,
    FixedDuration,
    /// Configured duration is zero: the row exists but is already expired
    Unlocked,
    /// Instance type was not recognized; daily reset applied
    FallbackDailyReset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutExpiry {
    pub expires_at: DateTime<Utc>,
    pub rule: ExpiryRule,
}

/// Lockout tuning, loaded with the rest of the content settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LockoutRules {
    /// Fixed lockout length in minutes for non-mythic dungeons, per difficulty.
    /// Zero means the content is effectively unlocked. A missing entry is a
    /// configuration error.
    pub dungeon_minutes: BTreeMap<InstanceDifficulty, u32>,
    /// Completions allowed before rewards start to diminish
    pub diminishing_start: u32,
    /// Multiplier applied per completion past `diminishing_start`
    pub diminishing_decay: f64,
    /// Lowest reward factor a soft lockout can reach
    pub diminishing_floor: f64,
    /// Maximum number of one-week extensions; `None` means unbounded
    pub max_extensions: Option<u32>,
}

impl Default for LockoutRules {
    fn default() -> Self {
        Self {
            dungeon_minutes: BTreeMap::from([
                (InstanceDifficulty::Normal, 0),
                (InstanceDifficulty::Veteran, 0),
            ]),
            diminishing_start: 5,
            diminishing_decay: 0.8,
            diminishing_floor: 0.1,
            max_extensions: Some(4),
        }
    }
}

impl LockoutRules {
    pub fn validate(&self) -> Result<(), DomainError> {
        if !(self.diminishing_decay > 0.0 && self.diminishing_decay <= 1.0) {
            return Err(DomainError::configuration(format!(
                "diminishing decay must be in (0, 1], got {}",
                self.diminishing_decay
            )));
        }
        if !(0.0..=1.0).contains(&self.diminishing_floor) {
            return Err(DomainError::configuration(format!(
                "diminishing floor must be in [0, 1], got {}",
                self.diminishing_floor
            )));
        }
        Ok(())
    }

    /// Expiry for a lockout created at `now`.
    pub fn expiry_for(
        &self,
        instance_type: InstanceType,
        difficulty: InstanceDifficulty,
        now: DateTime<Utc>,
        clock: &ResetClock,
    ) -> Result<LockoutExpiry, DomainError> {
        let expiry = match instance_type {
            InstanceType::Raid => LockoutExpiry {
                expires_at: clock.next_weekly_reset(now),
                rule: ExpiryRule::WeeklyReset,
            },
            InstanceType::Dungeon if difficulty.is_soft_lockout() => LockoutExpiry {
                expires_at: clock.next_daily_reset(now),
                rule: ExpiryRule::DailyReset,
            },
            InstanceType::Dungeon => {
                let minutes = self.dungeon_minutes.get(&difficulty).copied().ok_or_else(|| {
                    DomainError::configuration(format!(
                        "No dungeon lockout duration configured for {difficulty}"
                    ))
                })?;
                if minutes == 0 {
                    LockoutExpiry {
                        expires_at: now,
                        rule: ExpiryRule::Unlocked,
                    }
                } else {
                    LockoutExpiry {
                        expires_at: now + Duration::minutes(i64::from(minutes)),
                        rule: ExpiryRule::FixedDuration,
                    }
                }
            }
            InstanceType::Expedition | InstanceType::Adventure => LockoutExpiry {
                expires_at: clock.next_daily_reset(now),
                rule: ExpiryRule::DailyReset,
            },
            InstanceType::Unrecognized => LockoutExpiry {
                expires_at: clock.next_daily_reset(now),
                rule: ExpiryRule::FallbackDailyReset,
            },
        };
        Ok(expiry)
    }

    /// Reward factor after a completion brings the count to `completion_count`.
    pub fn next_factor(&self, completion_count: u32, current_factor: f64) -> f64 {
        if completion_count > self.diminishing_start {
            (current_factor * self.diminishing_decay).max(self.diminishing_floor)
        } else {
            current_factor
        }
    }
}
