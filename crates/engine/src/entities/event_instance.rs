//! Event instance operations.

use std::sync::Arc;

use chrono::Duration;
use timegate_domain::{
    DomainError, EventDefId, EventInstance, EventInstanceId, EventProgress, EventState, ZoneId,
    ZoneInstanceId,
};

use super::error::{ContentError, MAX_UPDATE_ATTEMPTS};
use crate::infrastructure::ports::{ClockPort, EventInstanceRepo, ParticipationRepo};

/// Lifecycle of running public events.
///
/// Every transition is guarded by the current state. A transition that
/// loses a race is re-validated against the winner's state, so a second
/// `start` or a `complete` after `fail` surfaces as
/// `InvalidStateTransition` instead of overwriting.
pub struct EventInstanceManager {
    repo: Arc<dyn EventInstanceRepo>,
    participation: Arc<dyn ParticipationRepo>,
    clock: Arc<dyn ClockPort>,
}

impl EventInstanceManager {
    pub fn new(
        repo: Arc<dyn EventInstanceRepo>,
        participation: Arc<dyn ParticipationRepo>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            repo,
            participation,
            clock,
        }
    }

    /// Create a pending instance.
    pub async fn create(
        &self,
        event_def_id: EventDefId,
        zone_id: ZoneId,
        instance_id: ZoneInstanceId,
    ) -> Result<EventInstance, ContentError> {
        let instance = EventInstance::new(event_def_id, zone_id, instance_id, self.clock.now());
        self.repo.insert(&instance).await?;
        tracing::info!(
            event_instance = %instance.id(),
            event_def = %event_def_id,
            zone = %zone_id,
            "Event instance created"
        );
        Ok(instance)
    }

    pub async fn get(&self, id: EventInstanceId) -> Result<Option<EventInstance>, ContentError> {
        Ok(self.repo.get(id).await?)
    }

    pub async fn list_active(&self) -> Result<Vec<EventInstance>, ContentError> {
        Ok(self.repo.list_by_state(EventState::Active).await?)
    }

    pub async fn list_for_zone(&self, zone_id: ZoneId) -> Result<Vec<EventInstance>, ContentError> {
        Ok(self.repo.list_for_zone(zone_id).await?)
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    pub async fn start(
        &self,
        id: EventInstanceId,
        duration: Duration,
    ) -> Result<EventInstance, ContentError> {
        let now = self.clock.now();
        let instance = self.update(id, |i| i.start(duration, now)).await?;
        tracing::info!(
            event_instance = %id,
            ends_at = ?instance.ends_at(),
            "Event instance started"
        );
        Ok(instance)
    }

    pub async fn complete(&self, id: EventInstanceId) -> Result<EventInstance, ContentError> {
        let now = self.clock.now();
        let instance = self.update(id, |i| i.complete(now)).await?;
        tracing::info!(event_instance = %id, "Event instance completed");
        Ok(instance)
    }

    pub async fn fail(&self, id: EventInstanceId) -> Result<EventInstance, ContentError> {
        let now = self.clock.now();
        let instance = self.update(id, |i| i.fail(now)).await?;
        tracing::info!(event_instance = %id, "Event instance failed");
        Ok(instance)
    }

    pub async fn cancel(&self, id: EventInstanceId) -> Result<EventInstance, ContentError> {
        let now = self.clock.now();
        let instance = self.update(id, |i| i.cancel(now)).await?;
        tracing::info!(event_instance = %id, "Event instance cancelled");
        Ok(instance)
    }

    // =========================================================================
    // In-flight updates
    // =========================================================================

    /// Move to a new phase. Phase ordering is the caller's concern.
    pub async fn advance_phase(
        &self,
        id: EventInstanceId,
        new_phase: u32,
        initial_progress: EventProgress,
    ) -> Result<EventInstance, ContentError> {
        let now = self.clock.now();
        let instance = self
            .update(id, |i| i.advance_phase(new_phase, initial_progress.clone(), now))
            .await?;
        tracing::info!(event_instance = %id, phase = new_phase, "Event phase advanced");
        Ok(instance)
    }

    pub async fn advance_wave(
        &self,
        id: EventInstanceId,
        new_wave: u32,
    ) -> Result<EventInstance, ContentError> {
        let now = self.clock.now();
        let instance = self.update(id, |i| i.advance_wave(new_wave, now)).await?;
        tracing::debug!(event_instance = %id, wave = new_wave, "Event wave advanced");
        Ok(instance)
    }

    /// Shallow-merge `progress` into the stored progress document.
    pub async fn update_progress(
        &self,
        id: EventInstanceId,
        progress: &EventProgress,
    ) -> Result<EventInstance, ContentError> {
        let now = self.clock.now();
        self.update(id, |i| i.update_progress(progress, now)).await
    }

    pub async fn update_difficulty(
        &self,
        id: EventInstanceId,
        participant_count: u32,
    ) -> Result<EventInstance, ContentError> {
        let now = self.clock.now();
        let instance = self
            .update(id, |i| i.update_difficulty(participant_count, now))
            .await?;
        tracing::debug!(
            event_instance = %id,
            participants = participant_count,
            multiplier = instance.difficulty_multiplier(),
            "Event difficulty rescaled"
        );
        Ok(instance)
    }

    /// Recount participation rows and rescale difficulty from the live count.
    pub async fn update_participant_count(
        &self,
        id: EventInstanceId,
    ) -> Result<EventInstance, ContentError> {
        let count = self.participation.count_for_event(id).await?;
        self.update_difficulty(id, count).await
    }

    // =========================================================================
    // Sweeps
    // =========================================================================

    /// Fail every active instance past its end time. Returns the ids failed
    /// by this call; instances another sweep got to first are skipped.
    pub async fn expire_overdue(&self) -> Result<Vec<EventInstanceId>, ContentError> {
        let now = self.clock.now();
        let mut expired = Vec::new();
        for instance in self.repo.list_by_state(EventState::Active).await? {
            if !instance.is_overdue(now) {
                continue;
            }
            match self.fail(instance.id()).await {
                Ok(_) => expired.push(instance.id()),
                Err(ContentError::Domain(DomainError::InvalidStateTransition(_))) => {
                    tracing::debug!(
                        event_instance = %instance.id(),
                        "Overdue instance already finished elsewhere"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(expired)
    }

    /// Delete terminal instances finished more than `ttl` ago. Participation
    /// rows are history and outlive their instance.
    pub async fn purge_terminal(&self, ttl: Duration) -> Result<u64, ContentError> {
        let cutoff = self.clock.now() - ttl;
        let mut purged = 0u64;
        for instance in self.repo.list_finished_before(cutoff).await? {
            if self.repo.delete(instance.id()).await? {
                purged += 1;
            }
        }
        if purged > 0 {
            tracing::info!(instances = purged, "Terminal event instances purged");
        }
        Ok(purged)
    }

    async fn update<F>(&self, id: EventInstanceId, mut apply: F) -> Result<EventInstance, ContentError>
    where
        F: FnMut(&mut EventInstance) -> Result<(), DomainError> + Send,
    {
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let mut instance = self
                .repo
                .get(id)
                .await?
                .ok_or_else(|| DomainError::not_found("EventInstance", id))?;
            let expected = instance.revision();
            apply(&mut instance)?;
            if self.repo.compare_and_set(&instance, expected).await? {
                return Ok(instance.with_revision(expected + 1));
            }
            tracing::debug!(event_instance = %id, attempt, "Event instance changed concurrently, retrying");
        }
        Err(ContentError::conflict("EventInstance", id))
    }
}
