//! Event schedule operations.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use timegate_domain::{
    DomainError, EventSchedule, ScheduleKey, TriggerConfig, UnarmedSchedulePolicy,
};

use super::error::{ContentError, MAX_UPDATE_ATTEMPTS};
use crate::infrastructure::ports::{ClockPort, EventScheduleRepo};

/// Recurring event schedules, one per event definition per zone.
///
/// This module records trigger timestamps. It never decides how the next
/// trigger time is derived; callers pass it in (see the ticker's trigger
/// policy).
pub struct EventScheduler {
    repo: Arc<dyn EventScheduleRepo>,
    clock: Arc<dyn ClockPort>,
    unarmed: UnarmedSchedulePolicy,
}

impl EventScheduler {
    pub fn new(
        repo: Arc<dyn EventScheduleRepo>,
        clock: Arc<dyn ClockPort>,
        unarmed: UnarmedSchedulePolicy,
    ) -> Self {
        Self {
            repo,
            clock,
            unarmed,
        }
    }

    pub fn unarmed_policy(&self) -> UnarmedSchedulePolicy {
        self.unarmed
    }

    /// Create an enabled, unarmed schedule.
    ///
    /// Fails with `AlreadyExists` when the key is taken and with
    /// `Configuration` when the trigger config is malformed.
    pub async fn create_schedule(
        &self,
        key: ScheduleKey,
        trigger: TriggerConfig,
    ) -> Result<EventSchedule, ContentError> {
        let schedule = EventSchedule::new(key, trigger, self.clock.now())?;
        if !self.repo.insert(&schedule).await? {
            return Err(DomainError::already_exists("EventSchedule", key).into());
        }
        tracing::info!(schedule = %key, trigger = ?trigger, "Created event schedule");
        Ok(schedule)
    }

    pub async fn get(&self, key: ScheduleKey) -> Result<Option<EventSchedule>, ContentError> {
        Ok(self.repo.get(key).await?)
    }

    pub async fn list(&self) -> Result<Vec<EventSchedule>, ContentError> {
        Ok(self.repo.list().await?)
    }

    /// Enabled schedules whose trigger time has come.
    ///
    /// Unarmed schedules are included only under
    /// `UnarmedSchedulePolicy::FireImmediately`.
    pub async fn get_due_schedules(&self) -> Result<Vec<EventSchedule>, ContentError> {
        let now = self.clock.now();
        let due = self
            .repo
            .list_enabled()
            .await?
            .into_iter()
            .filter(|s| s.is_due(now, self.unarmed))
            .collect();
        Ok(due)
    }

    /// Record a trigger at the current time and move to `next_trigger_at`.
    pub async fn mark_triggered(
        &self,
        key: ScheduleKey,
        next_trigger_at: DateTime<Utc>,
    ) -> Result<EventSchedule, ContentError> {
        let now = self.clock.now();
        let schedule = self
            .update(key, |s| s.mark_triggered(now, next_trigger_at))
            .await?;
        tracing::debug!(
            schedule = %key,
            next_trigger_at = %next_trigger_at,
            "Schedule triggered"
        );
        Ok(schedule)
    }

    /// Mark triggered only if the schedule is still due.
    ///
    /// Returns `None` when another sweep already fired it or it was
    /// disabled in the meantime, so concurrent sweeps fire each trigger once.
    pub async fn claim_due(
        &self,
        key: ScheduleKey,
        next_trigger_at: DateTime<Utc>,
    ) -> Result<Option<EventSchedule>, ContentError> {
        let now = self.clock.now();
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let Some(mut schedule) = self.repo.get(key).await? else {
                return Err(DomainError::not_found("EventSchedule", key).into());
            };
            if !schedule.is_due(now, self.unarmed) {
                tracing::debug!(schedule = %key, "Schedule no longer due, skipping");
                return Ok(None);
            }
            let expected = schedule.revision();
            schedule.mark_triggered(now, next_trigger_at)?;
            if self.repo.compare_and_set(&schedule, expected).await? {
                tracing::debug!(
                    schedule = %key,
                    next_trigger_at = %next_trigger_at,
                    "Schedule claimed"
                );
                return Ok(Some(schedule.with_revision(expected + 1)));
            }
            tracing::debug!(schedule = %key, attempt, "Schedule changed concurrently, retrying");
        }
        Err(ContentError::conflict("EventSchedule", key))
    }

    /// Give a schedule its first trigger time.
    pub async fn arm(
        &self,
        key: ScheduleKey,
        at: DateTime<Utc>,
    ) -> Result<EventSchedule, ContentError> {
        self.update(key, |s| {
            s.arm(at);
            Ok(())
        })
        .await
    }

    pub async fn enable(&self, key: ScheduleKey) -> Result<EventSchedule, ContentError> {
        let schedule = self
            .update(key, |s| {
                s.enable();
                Ok(())
            })
            .await?;
        tracing::info!(schedule = %key, "Schedule enabled");
        Ok(schedule)
    }

    pub async fn disable(&self, key: ScheduleKey) -> Result<EventSchedule, ContentError> {
        let schedule = self
            .update(key, |s| {
                s.disable();
                Ok(())
            })
            .await?;
        tracing::info!(schedule = %key, "Schedule disabled");
        Ok(schedule)
    }

    async fn update<F>(&self, key: ScheduleKey, mut apply: F) -> Result<EventSchedule, ContentError>
    where
        F: FnMut(&mut EventSchedule) -> Result<(), DomainError> + Send,
    {
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let mut schedule = self
                .repo
                .get(key)
                .await?
                .ok_or_else(|| DomainError::not_found("EventSchedule", key))?;
            let expected = schedule.revision();
            apply(&mut schedule)?;
            if self.repo.compare_and_set(&schedule, expected).await? {
                return Ok(schedule.with_revision(expected + 1));
            }
            tracing::debug!(schedule = %key, attempt, "Schedule changed concurrently, retrying");
        }
        Err(ContentError::conflict("EventSchedule", key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{Duration, TimeZone};
    use timegate_domain::{EventDefId, ZoneId};

    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::ports::MockEventScheduleRepo;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0)
            .single()
            .expect("valid test timestamp")
    }

    fn key() -> ScheduleKey {
        ScheduleKey::new(EventDefId::new(3), ZoneId::new(12))
    }

    fn schedule() -> EventSchedule {
        EventSchedule::new(key(), TriggerConfig::Interval { minutes: 60 }, now())
            .expect("valid schedule")
    }

    fn scheduler(repo: MockEventScheduleRepo, policy: UnarmedSchedulePolicy) -> EventScheduler {
        EventScheduler::new(Arc::new(repo), Arc::new(FixedClock(now())), policy)
    }

    #[tokio::test]
    async fn create_rejects_duplicate_key() {
        let mut repo = MockEventScheduleRepo::new();
        repo.expect_insert().times(1).returning(|_| Ok(false));

        let result = scheduler(repo, UnarmedSchedulePolicy::FireImmediately)
            .create_schedule(key(), TriggerConfig::Interval { minutes: 60 })
            .await;

        assert!(matches!(
            result,
            Err(ContentError::Domain(DomainError::AlreadyExists { .. }))
        ));
    }

    #[tokio::test]
    async fn create_rejects_bad_trigger_without_touching_store() {
        let mut repo = MockEventScheduleRepo::new();
        repo.expect_insert().never();

        let result = scheduler(repo, UnarmedSchedulePolicy::FireImmediately)
            .create_schedule(
                key(),
                TriggerConfig::RandomWindow {
                    min_minutes: 30,
                    max_minutes: 10,
                },
            )
            .await;

        assert!(matches!(
            result,
            Err(ContentError::Domain(DomainError::Configuration(_)))
        ));
    }

    #[tokio::test]
    async fn due_schedules_follow_unarmed_policy() {
        let unarmed = schedule();
        let mut armed_later = schedule();
        armed_later.arm(now() + Duration::minutes(5));
        let mut armed_past = schedule();
        armed_past.arm(now() - Duration::minutes(5));
        let rows = vec![unarmed, armed_later, armed_past];

        let mut repo = MockEventScheduleRepo::new();
        let fire_rows = rows.clone();
        repo.expect_list_enabled()
            .returning(move || Ok(fire_rows.clone()));
        let due = scheduler(repo, UnarmedSchedulePolicy::FireImmediately)
            .get_due_schedules()
            .await
            .expect("due");
        assert_eq!(due.len(), 2);

        let mut repo = MockEventScheduleRepo::new();
        repo.expect_list_enabled().returning(move || Ok(rows.clone()));
        let due = scheduler(repo, UnarmedSchedulePolicy::WaitForArm)
            .get_due_schedules()
            .await
            .expect("due");
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].next_trigger_at(), Some(now() - Duration::minutes(5)));
    }

    #[tokio::test]
    async fn mark_triggered_retries_after_lost_race() {
        let mut repo = MockEventScheduleRepo::new();
        repo.expect_get()
            .withf(|k| *k == key())
            .times(2)
            .returning(|_| Ok(Some(schedule())));
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        repo.expect_compare_and_set()
            .withf(|s, expected| *expected == 0 && s.last_triggered_at() == Some(now()))
            .times(2)
            .returning(move |_, _| Ok(seen.fetch_add(1, Ordering::SeqCst) > 0));

        let next = now() + Duration::hours(1);
        let updated = scheduler(repo, UnarmedSchedulePolicy::FireImmediately)
            .mark_triggered(key(), next)
            .await
            .expect("mark");

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(updated.next_trigger_at(), Some(next));
        assert_eq!(updated.revision(), 1);
    }

    #[tokio::test]
    async fn persistent_conflict_gives_up() {
        let mut repo = MockEventScheduleRepo::new();
        repo.expect_get().returning(|_| Ok(Some(schedule())));
        repo.expect_compare_and_set()
            .times(MAX_UPDATE_ATTEMPTS)
            .returning(|_, _| Ok(false));

        let result = scheduler(repo, UnarmedSchedulePolicy::FireImmediately)
            .disable(key())
            .await;

        assert!(matches!(result, Err(ContentError::Conflict { .. })));
    }

    #[tokio::test]
    async fn claim_due_skips_schedule_fired_by_another_sweep() {
        let mut fired = schedule();
        fired
            .mark_triggered(now(), now() + Duration::hours(1))
            .expect("trigger");
        let fired = fired.with_revision(1);

        let mut repo = MockEventScheduleRepo::new();
        let mut reads = vec![fired, schedule()];
        repo.expect_get()
            .times(2)
            .returning(move |_| Ok(reads.pop()));
        repo.expect_compare_and_set()
            .times(1)
            .returning(|_, _| Ok(false));

        let claimed = scheduler(repo, UnarmedSchedulePolicy::FireImmediately)
            .claim_due(key(), now() + Duration::minutes(30))
            .await
            .expect("claim");

        assert!(claimed.is_none());
    }

    #[tokio::test]
    async fn claim_due_marks_due_schedule() {
        let mut repo = MockEventScheduleRepo::new();
        repo.expect_get().returning(|_| Ok(Some(schedule())));
        repo.expect_compare_and_set().returning(|_, _| Ok(true));

        let next = now() + Duration::minutes(30);
        let claimed = scheduler(repo, UnarmedSchedulePolicy::FireImmediately)
            .claim_due(key(), next)
            .await
            .expect("claim")
            .expect("due schedule is claimed");

        assert_eq!(claimed.last_triggered_at(), Some(now()));
        assert_eq!(claimed.next_trigger_at(), Some(next));
    }

    #[tokio::test]
    async fn missing_schedule_is_not_found() {
        let mut repo = MockEventScheduleRepo::new();
        repo.expect_get().returning(|_| Ok(None));
        repo.expect_compare_and_set().never();

        let result = scheduler(repo, UnarmedSchedulePolicy::FireImmediately)
            .arm(key(), now())
            .await;

        assert!(result.is_err_and(|e| e.is_not_found()));
    }
}
