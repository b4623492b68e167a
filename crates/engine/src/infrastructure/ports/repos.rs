//! Repository port traits for content storage.
//!
//! Adapters never hold locks across calls. Every mutation of an existing
//! row goes through `compare_and_set`, which writes only when the stored
//! revision still equals `expected_revision` and bumps it on success.
//! Callers re-read and retry when it returns `false`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use timegate_domain::{
    BossId, BossSpawnState, CharacterId, EventInstance, EventInstanceId, EventSchedule,
    EventState, InstanceGuid, InstanceLockout, LockoutKey, Participation, ScheduleKey,
    WorldBossSpawn, ZoneId,
};

use super::error::RepoError;

// =============================================================================
// Event Instances
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventInstanceRepo: Send + Sync {
    async fn get(&self, id: EventInstanceId) -> Result<Option<EventInstance>, RepoError>;
    /// Fails with `ConstraintViolation` if the id is taken.
    async fn insert(&self, instance: &EventInstance) -> Result<(), RepoError>;
    async fn compare_and_set(
        &self,
        instance: &EventInstance,
        expected_revision: u64,
    ) -> Result<bool, RepoError>;
    async fn delete(&self, id: EventInstanceId) -> Result<bool, RepoError>;

    // Queries
    async fn list_by_state(&self, state: EventState) -> Result<Vec<EventInstance>, RepoError>;
    async fn list_for_zone(&self, zone_id: ZoneId) -> Result<Vec<EventInstance>, RepoError>;
    /// Terminal instances whose `finished_at` is strictly before `cutoff`.
    async fn list_finished_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<EventInstance>, RepoError>;
}

// =============================================================================
// Participation
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ParticipationRepo: Send + Sync {
    async fn get(
        &self,
        event_instance_id: EventInstanceId,
        character_id: CharacterId,
    ) -> Result<Option<Participation>, RepoError>;
    /// Returns the stored row and whether this call created it.
    async fn insert_if_absent(
        &self,
        participation: &Participation,
    ) -> Result<(Participation, bool), RepoError>;
    async fn compare_and_set(
        &self,
        participation: &Participation,
        expected_revision: u64,
    ) -> Result<bool, RepoError>;
    async fn list_for_event(
        &self,
        event_instance_id: EventInstanceId,
    ) -> Result<Vec<Participation>, RepoError>;
    async fn count_for_event(&self, event_instance_id: EventInstanceId) -> Result<u32, RepoError>;
}

// =============================================================================
// Event Schedules
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventScheduleRepo: Send + Sync {
    async fn get(&self, key: ScheduleKey) -> Result<Option<EventSchedule>, RepoError>;
    /// Returns false without writing if a schedule already exists for the key.
    async fn insert(&self, schedule: &EventSchedule) -> Result<bool, RepoError>;
    async fn compare_and_set(
        &self,
        schedule: &EventSchedule,
        expected_revision: u64,
    ) -> Result<bool, RepoError>;
    async fn list(&self) -> Result<Vec<EventSchedule>, RepoError>;
    async fn list_enabled(&self) -> Result<Vec<EventSchedule>, RepoError>;
}

// =============================================================================
// World Bosses
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorldBossRepo: Send + Sync {
    async fn get(
        &self,
        boss_id: BossId,
        zone_id: ZoneId,
    ) -> Result<Option<WorldBossSpawn>, RepoError>;
    /// Returns the stored row, whether or not this call created it.
    async fn insert_if_absent(&self, spawn: &WorldBossSpawn)
        -> Result<WorldBossSpawn, RepoError>;
    async fn compare_and_set(
        &self,
        spawn: &WorldBossSpawn,
        expected_revision: u64,
    ) -> Result<bool, RepoError>;
    async fn list_for_zone(&self, zone_id: ZoneId) -> Result<Vec<WorldBossSpawn>, RepoError>;
    async fn list_by_state(
        &self,
        state: BossSpawnState,
    ) -> Result<Vec<WorldBossSpawn>, RepoError>;
}

// =============================================================================
// Instance Lockouts
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LockoutRepo: Send + Sync {
    async fn get(&self, key: LockoutKey) -> Result<Option<InstanceLockout>, RepoError>;
    /// Returns the stored row and whether this call created it.
    async fn insert_if_absent(
        &self,
        lockout: &InstanceLockout,
    ) -> Result<(InstanceLockout, bool), RepoError>;
    async fn compare_and_set(
        &self,
        lockout: &InstanceLockout,
        expected_revision: u64,
    ) -> Result<bool, RepoError>;
    async fn delete(&self, key: LockoutKey) -> Result<bool, RepoError>;
    async fn delete_for_character(&self, character_id: CharacterId) -> Result<u64, RepoError>;
    /// Remove every row with `expires_at < now`. Rows expiring at or after
    /// `now` are never touched.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, RepoError>;

    // Queries
    async fn list_for_character(
        &self,
        character_id: CharacterId,
    ) -> Result<Vec<InstanceLockout>, RepoError>;
    async fn list_for_instance(
        &self,
        instance_guid: InstanceGuid,
    ) -> Result<Vec<InstanceLockout>, RepoError>;
}
