use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

// =============================================================================
// Reset Clock
// =============================================================================

/// Fixed wall-clock reset boundaries, all in UTC.
///
/// Pure arithmetic: nothing here reads the system clock. Both lookups treat
/// the boundary as inclusive of `now`, so asking exactly at a reset returns
/// that same instant rather than the following period's boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetClock {
    /// Day of week the weekly reset happens on (default: Tuesday)
    pub weekly_day: Weekday,
    /// Time of day for the weekly reset (default: 10:00)
    pub weekly_time: NaiveTime,
    /// Time of day for the daily reset (default: 10:00)
    pub daily_time: NaiveTime,
}

impl Default for ResetClock {
    fn default() -> Self {
        let ten_am = NaiveTime::from_hms_opt(10, 0, 0).unwrap_or(NaiveTime::MIN);
        Self {
            weekly_day: Weekday::Tue,
            weekly_time: ten_am,
            daily_time: ten_am,
        }
    }
}

impl ResetClock {
    pub fn new(weekly_day: Weekday, weekly_time: NaiveTime, daily_time: NaiveTime) -> Self {
        Self {
            weekly_day,
            weekly_time,
            daily_time,
        }
    }

    /// Next weekly boundary at or after `now`.
    pub fn next_weekly_reset(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = i64::from(now.weekday().num_days_from_monday());
        let target = i64::from(self.weekly_day.num_days_from_monday());
        let days_ahead = (target - today).rem_euclid(7);

        let candidate = (now.date_naive() + Duration::days(days_ahead))
            .and_time(self.weekly_time)
            .and_utc();

        if candidate >= now {
            candidate
        } else {
            candidate + Duration::weeks(1)
        }
    }

    /// Next daily boundary at or after `now`.
    pub fn next_daily_reset(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let candidate = now.date_naive().and_time(self.daily_time).and_utc();

        if candidate >= now {
            candidate
        } else {
            candidate + Duration::days(1)
        }
    }
}
