//! Next-trigger derivation for recurring event schedules.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use timegate_domain::TriggerConfig;

use crate::infrastructure::ports::RandomPort;

/// Decides when a schedule fires next after triggering at `from`.
pub struct TriggerPolicy {
    random: Arc<dyn RandomPort>,
}

impl TriggerPolicy {
    pub fn new(random: Arc<dyn RandomPort>) -> Self {
        Self { random }
    }

    /// Always strictly after `from`; trigger configs are validated to
    /// positive intervals on schedule creation.
    pub fn next_trigger_at(&self, trigger: &TriggerConfig, from: DateTime<Utc>) -> DateTime<Utc> {
        let minutes = match *trigger {
            TriggerConfig::Interval { minutes } => i64::from(minutes),
            TriggerConfig::RandomWindow {
                min_minutes,
                max_minutes,
            } => {
                let min = i32::try_from(min_minutes).unwrap_or(i32::MAX);
                let max = i32::try_from(max_minutes).unwrap_or(i32::MAX);
                i64::from(self.random.gen_range(min, max).clamp(min, max.max(min)))
            }
        };
        from + Duration::minutes(minutes.max(1))
    }
}
