//! Pure domain model for time-gated game content.
//!
//! Nothing in this crate performs I/O or reads the system clock. Every
//! operation that depends on time takes `now` explicitly.

pub mod entities;
pub mod error;
pub mod ids;
pub mod reset_clock;
pub mod value_objects;

pub use entities::{
    BossSpawnState, EventInstance, EventSchedule, EventState, InstanceLockout, LockoutKey,
    Participation, ScheduleKey, SpawnWindow, WorldBossSpawn,
};
pub use error::DomainError;
pub use ids::{
    BossId, CharacterId, EventDefId, EventInstanceId, InstanceDefId, InstanceGuid, ZoneId,
    ZoneInstanceId,
};
pub use reset_clock::ResetClock;
pub use value_objects::{
    assign_reward_tiers, event_difficulty_multiplier, ranking_order, Contribution,
    ContributionRules, EventProgress, ExpiryRule, InstanceDifficulty, InstanceType,
    LockoutExpiry, LockoutRules, ProgressKey, ProgressValue, RankingEntry, RewardAssignment,
    RewardTier, TriggerConfig, TriggerType, UnarmedSchedulePolicy, PROGRESS_SCHEMA_VERSION,
};
