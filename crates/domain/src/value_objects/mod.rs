//! Value objects shared by the time-gated content aggregates.

mod contribution;
mod difficulty;
mod event_progress;
mod instance_type;
mod lockout_rules;
mod reward_tier;
mod trigger;

pub use contribution::{Contribution, ContributionRules};
pub use difficulty::{event_difficulty_multiplier, InstanceDifficulty};
pub use event_progress::{EventProgress, ProgressKey, ProgressValue, PROGRESS_SCHEMA_VERSION};
pub use instance_type::InstanceType;
pub use lockout_rules::{ExpiryRule, LockoutExpiry, LockoutRules};
pub use reward_tier::{
    assign_reward_tiers, ranking_order, RankingEntry, RewardAssignment, RewardTier,
};
pub use trigger::{TriggerConfig, TriggerType, UnarmedSchedulePolicy};
