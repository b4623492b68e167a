//! EventInstance entity - one running occurrence of a public world event
//!
//! State machine: `Pending -> Active -> {Complete, Failed, Cancelled}`.
//! Pending may also be cancelled directly. Terminal states are immutable:
//! every mutation on a terminal instance fails with
//! `InvalidStateTransition` and leaves the instance untouched.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::ids::{EventDefId, EventInstanceId, ZoneId, ZoneInstanceId};
use crate::value_objects::{event_difficulty_multiplier, EventProgress};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventState {
    Pending,
    Active,
    Complete,
    Failed,
    Cancelled,
}

impl EventState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EventState::Complete | EventState::Failed | EventState::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventState::Pending => "pending",
            EventState::Active => "active",
            EventState::Complete => "complete",
            EventState::Failed => "failed",
            EventState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for EventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInstance {
    id: EventInstanceId,
    event_def_id: EventDefId,
    zone_id: ZoneId,
    /// Zone shard the event runs in
    instance_id: ZoneInstanceId,

    state: EventState,
    phase: u32,
    wave: u32,
    progress: EventProgress,

    participant_count: u32,
    difficulty_multiplier: f32,

    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
    /// When a terminal state was reached
    finished_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,

    /// Optimistic concurrency token, owned by the repository
    revision: u64,
}

impl EventInstance {
    pub fn new(
        event_def_id: EventDefId,
        zone_id: ZoneId,
        instance_id: ZoneInstanceId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EventInstanceId::new(),
            event_def_id,
            zone_id,
            instance_id,
            state: EventState::Pending,
            phase: 0,
            wave: 0,
            progress: EventProgress::new(),
            participant_count: 0,
            difficulty_multiplier: event_difficulty_multiplier(0),
            created_at: now,
            started_at: None,
            ends_at: None,
            finished_at: None,
            updated_at: now,
            revision: 0,
        }
    }

    // Read accessors
    pub fn id(&self) -> EventInstanceId {
        self.id
    }

    pub fn event_def_id(&self) -> EventDefId {
        self.event_def_id
    }

    pub fn zone_id(&self) -> ZoneId {
        self.zone_id
    }

    pub fn instance_id(&self) -> ZoneInstanceId {
        self.instance_id
    }

    pub fn state(&self) -> EventState {
        self.state
    }

    pub fn phase(&self) -> u32 {
        self.phase
    }

    pub fn wave(&self) -> u32 {
        self.wave
    }

    pub fn progress(&self) -> &EventProgress {
        &self.progress
    }

    pub fn participant_count(&self) -> u32 {
        self.participant_count
    }

    pub fn difficulty_multiplier(&self) -> f32 {
        self.difficulty_multiplier
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn ends_at(&self) -> Option<DateTime<Utc>> {
        self.ends_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Set the concurrency token (for repository adapters).
    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }

    pub fn is_active(&self) -> bool {
        self.state == EventState::Active
    }

    /// Active and past its scheduled end.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.ends_at.is_some_and(|ends_at| ends_at <= now)
    }

    /// Time left before the event runs out, zero once overdue.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.ends_at
            .filter(|_| self.is_active())
            .map(|ends_at| (ends_at - now).max(Duration::zero()))
    }

    // State transitions

    pub fn start(&mut self, duration: Duration, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.require(&[EventState::Pending], "start")?;
        if duration <= Duration::zero() {
            return Err(DomainError::validation("event duration must be positive"));
        }
        self.state = EventState::Active;
        self.started_at = Some(now);
        self.ends_at = Some(now + duration);
        self.updated_at = now;
        Ok(())
    }

    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.require(&[EventState::Active], "complete")?;
        self.finish(EventState::Complete, now);
        Ok(())
    }

    pub fn fail(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.require(&[EventState::Active], "fail")?;
        self.finish(EventState::Failed, now);
        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.require(&[EventState::Pending, EventState::Active], "cancel")?;
        self.finish(EventState::Cancelled, now);
        Ok(())
    }

    // In-flight updates. Ordering of phases and waves is the caller's concern.

    /// Move to `new_phase`, replacing the phase progress with `initial_progress`.
    pub fn advance_phase(
        &mut self,
        new_phase: u32,
        initial_progress: EventProgress,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.require_live("advance phase")?;
        self.phase = new_phase;
        self.progress = initial_progress;
        self.updated_at = now;
        Ok(())
    }

    pub fn advance_wave(&mut self, new_wave: u32, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.require_live("advance wave")?;
        self.wave = new_wave;
        self.updated_at = now;
        Ok(())
    }

    pub fn update_progress(
        &mut self,
        progress: &EventProgress,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.require_live("update progress")?;
        self.progress.merge(progress)?;
        self.updated_at = now;
        Ok(())
    }

    /// Record the participant count and rescale difficulty from it.
    pub fn update_difficulty(
        &mut self,
        participant_count: u32,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.require_live("update difficulty")?;
        self.participant_count = participant_count;
        self.difficulty_multiplier = event_difficulty_multiplier(participant_count);
        self.updated_at = now;
        Ok(())
    }

    fn finish(&mut self, state: EventState, now: DateTime<Utc>) {
        self.state = state;
        self.finished_at = Some(now);
        self.updated_at = now;
    }

    fn require(&self, allowed: &[EventState], action: &str) -> Result<(), DomainError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(DomainError::invalid_state_transition(format!(
                "cannot {action} event instance {} in state {}",
                self.id, self.state
            )))
        }
    }

    fn require_live(&self, action: &str) -> Result<(), DomainError> {
        self.require(&[EventState::Pending, EventState::Active], action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::{ProgressKey, ProgressValue};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0)
            .single()
            .expect("valid test timestamp")
    }

    fn pending() -> EventInstance {
        EventInstance::new(EventDefId::new(7), ZoneId::new(51), ZoneInstanceId::new(1), now())
    }

    fn active() -> EventInstance {
        let mut event = pending();
        event
            .start(Duration::minutes(30), now())
            .expect("start from pending");
        event
    }

    #[test]
    fn new_instance_is_pending_with_base_difficulty() {
        let event = pending();
        assert_eq!(event.state(), EventState::Pending);
        assert_eq!(event.difficulty_multiplier(), 1.0);
        assert!(event.started_at().is_none());
    }

    #[test]
    fn start_sets_window_and_second_start_fails() {
        let mut event = active();
        assert_eq!(event.state(), EventState::Active);
        assert_eq!(event.started_at(), Some(now()));
        assert_eq!(event.ends_at(), Some(now() + Duration::minutes(30)));

        let before = event.clone();
        let err = event
            .start(Duration::minutes(30), now())
            .expect_err("second start must fail");
        assert!(matches!(err, DomainError::InvalidStateTransition(_)));
        assert_eq!(event, before);
    }

    #[test]
    fn complete_and_fail_require_active() {
        let mut event = pending();
        assert!(event.complete(now()).is_err());
        assert!(event.fail(now()).is_err());

        let mut event = active();
        event.complete(now()).expect("complete from active");
        assert_eq!(event.state(), EventState::Complete);
        assert_eq!(event.finished_at(), Some(now()));
    }

    #[test]
    fn cancel_from_pending_or_active() {
        let mut event = pending();
        event.cancel(now()).expect("cancel pending");
        assert_eq!(event.state(), EventState::Cancelled);

        let mut event = active();
        event.cancel(now()).expect("cancel active");
        assert_eq!(event.state(), EventState::Cancelled);
    }

    #[test]
    fn terminal_states_reject_every_transition() {
        let mut terminals = Vec::new();
        for finish in [
            EventInstance::complete as fn(&mut EventInstance, DateTime<Utc>) -> Result<(), DomainError>,
            EventInstance::fail,
            EventInstance::cancel,
        ] {
            let mut event = active();
            finish(&mut event, now()).expect("finish");
            terminals.push(event);
        }

        for mut event in terminals {
            let before = event.clone();
            let results = [
                event.start(Duration::minutes(5), now()),
                event.complete(now()),
                event.fail(now()),
                event.cancel(now()),
                event.advance_phase(2, EventProgress::new(), now()),
                event.advance_wave(3, now()),
                event.update_progress(&EventProgress::new(), now()),
                event.update_difficulty(40, now()),
            ];
            for result in results {
                assert!(matches!(
                    result,
                    Err(DomainError::InvalidStateTransition(_))
                ));
            }
            assert_eq!(event, before);
        }
    }

    #[test]
    fn phases_and_waves_are_not_forced_monotonic() {
        let mut event = active();
        event
            .advance_phase(3, EventProgress::new(), now())
            .expect("advance");
        event
            .advance_phase(1, EventProgress::new(), now())
            .expect("caller decides ordering");
        event.advance_wave(5, now()).expect("wave");
        event.advance_wave(2, now()).expect("wave");
        assert_eq!(event.phase(), 1);
        assert_eq!(event.wave(), 2);
    }

    #[test]
    fn advance_phase_replaces_progress_and_update_merges() {
        let mut event = active();
        event
            .update_progress(
                &EventProgress::new().with(ProgressKey::Kills, ProgressValue::Count(5)),
                now(),
            )
            .expect("merge");
        event
            .update_progress(
                &EventProgress::new().with(ProgressKey::Collected, ProgressValue::Count(2)),
                now(),
            )
            .expect("merge");
        assert_eq!(event.progress().entries().len(), 2);

        let initial = EventProgress::new().with(ProgressKey::BossHealth, ProgressValue::Percent(100.0));
        event.advance_phase(1, initial.clone(), now()).expect("phase");
        assert_eq!(event.progress(), &initial);
    }

    #[test]
    fn difficulty_follows_participant_count() {
        let mut event = active();
        for (count, expected) in [(10, 1.0), (11, 1.5), (25, 1.5), (26, 2.0), (50, 2.0), (51, 2.5)] {
            event.update_difficulty(count, now()).expect("update");
            assert_eq!(event.participant_count(), count);
            assert_eq!(event.difficulty_multiplier(), expected);
        }
    }

    #[test]
    fn overdue_only_when_active_past_end() {
        let event = active();
        assert!(!event.is_overdue(now() + Duration::minutes(29)));
        assert!(event.is_overdue(now() + Duration::minutes(30)));
        assert_eq!(
            event.remaining(now() + Duration::minutes(40)),
            Some(Duration::zero())
        );
        assert!(!pending().is_overdue(now() + Duration::days(1)));
    }

    #[test]
    fn start_rejects_non_positive_duration() {
        let mut event = pending();
        assert!(matches!(
            event.start(Duration::zero(), now()),
            Err(DomainError::Validation(_))
        ));
        assert_eq!(event.state(), EventState::Pending);
    }
}
