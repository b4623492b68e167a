//! Participation entity - one character's record in one event instance
//!
//! Rows are created on explicit join or lazily on the first contribution,
//! and are kept as historical record once the event ends. The
//! contribution score only ever grows; `rewards_claimed` only ever goes
//! from false to true.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::ids::{CharacterId, EventInstanceId};
use crate::value_objects::{Contribution, ContributionRules, RankingEntry, RewardTier};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participation {
    event_instance_id: EventInstanceId,
    character_id: CharacterId,

    contribution_score: u64,
    kills: u32,
    damage_dealt: u64,
    healing_done: u64,
    completed_objectives: BTreeSet<u32>,

    reward_tier: Option<RewardTier>,
    rewards_claimed: bool,

    joined_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,

    revision: u64,
}

impl Participation {
    pub fn new(
        event_instance_id: EventInstanceId,
        character_id: CharacterId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            event_instance_id,
            character_id,
            contribution_score: 0,
            kills: 0,
            damage_dealt: 0,
            healing_done: 0,
            completed_objectives: BTreeSet::new(),
            reward_tier: None,
            rewards_claimed: false,
            joined_at: now,
            last_activity_at: now,
            revision: 0,
        }
    }

    // Read accessors
    pub fn event_instance_id(&self) -> EventInstanceId {
        self.event_instance_id
    }

    pub fn character_id(&self) -> CharacterId {
        self.character_id
    }

    pub fn contribution_score(&self) -> u64 {
        self.contribution_score
    }

    pub fn kills(&self) -> u32 {
        self.kills
    }

    pub fn damage_dealt(&self) -> u64 {
        self.damage_dealt
    }

    pub fn healing_done(&self) -> u64 {
        self.healing_done
    }

    pub fn completed_objectives(&self) -> &BTreeSet<u32> {
        &self.completed_objectives
    }

    pub fn reward_tier(&self) -> Option<RewardTier> {
        self.reward_tier
    }

    pub fn rewards_claimed(&self) -> bool {
        self.rewards_claimed
    }

    pub fn joined_at(&self) -> DateTime<Utc> {
        self.joined_at
    }

    pub fn last_activity_at(&self) -> DateTime<Utc> {
        self.last_activity_at
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Set the concurrency token (for repository adapters).
    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }

    pub fn ranking_entry(&self) -> RankingEntry {
        RankingEntry {
            character_id: self.character_id,
            contribution_score: self.contribution_score,
            joined_at: self.joined_at,
        }
    }

    /// Apply one contribution and return the points it was worth.
    ///
    /// A repeated report of an already completed objective is worth nothing.
    pub fn record(
        &mut self,
        contribution: Contribution,
        rules: &ContributionRules,
        now: DateTime<Utc>,
    ) -> u64 {
        let points = match contribution {
            Contribution::Kill => {
                self.kills = self.kills.saturating_add(1);
                rules.points(contribution)
            }
            Contribution::Damage(amount) => {
                self.damage_dealt = self.damage_dealt.saturating_add(amount);
                rules.points(contribution)
            }
            Contribution::Healing(amount) => {
                self.healing_done = self.healing_done.saturating_add(amount);
                rules.points(contribution)
            }
            Contribution::Objective(index) => {
                if self.completed_objectives.insert(index) {
                    rules.points(contribution)
                } else {
                    0
                }
            }
        };
        self.contribution_score = self.contribution_score.saturating_add(points);
        self.last_activity_at = self.last_activity_at.max(now);
        points
    }

    pub fn set_reward_tier(&mut self, tier: RewardTier) {
        self.reward_tier = Some(tier);
    }

    /// Claim computed rewards exactly once.
    pub fn claim_rewards(&mut self) -> Result<RewardTier, DomainError> {
        if self.rewards_claimed {
            return Err(DomainError::already_claimed(
                self.event_instance_id,
                self.character_id,
            ));
        }
        let tier = self.reward_tier.ok_or_else(|| {
            DomainError::invalid_state_transition(format!(
                "reward tier for {} in event {} has not been calculated",
                self.character_id, self.event_instance_id
            ))
        })?;
        self.rewards_claimed = true;
        Ok(tier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0)
            .single()
            .expect("valid test timestamp")
    }

    fn participation() -> Participation {
        Participation::new(EventInstanceId::new(), CharacterId::new(), now())
    }

    #[test]
    fn contributions_accumulate_counters_and_score() {
        let rules = ContributionRules::default();
        let mut p = participation();
        p.record(Contribution::Kill, &rules, now());
        p.record(Contribution::Damage(1_250), &rules, now());
        p.record(Contribution::Healing(300), &rules, now());
        p.record(Contribution::Objective(0), &rules, now());

        assert_eq!(p.kills(), 1);
        assert_eq!(p.damage_dealt(), 1_250);
        assert_eq!(p.healing_done(), 300);
        assert_eq!(p.contribution_score(), 10 + 12 + 3 + 50);
    }

    #[test]
    fn duplicate_objective_report_awards_nothing() {
        let rules = ContributionRules::default();
        let mut p = participation();
        assert_eq!(p.record(Contribution::Objective(2), &rules, now()), 50);
        assert_eq!(p.record(Contribution::Objective(2), &rules, now()), 0);
        assert_eq!(p.completed_objectives().len(), 1);
        assert_eq!(p.contribution_score(), 50);
    }

    #[test]
    fn last_activity_never_moves_backward() {
        let rules = ContributionRules::default();
        let mut p = participation();
        p.record(Contribution::Kill, &rules, now() + Duration::minutes(5));
        p.record(Contribution::Kill, &rules, now() + Duration::minutes(1));
        assert_eq!(p.last_activity_at(), now() + Duration::minutes(5));
    }

    #[test]
    fn claim_requires_tier_and_happens_once() {
        let mut p = participation();
        assert!(matches!(
            p.claim_rewards(),
            Err(DomainError::InvalidStateTransition(_))
        ));
        assert!(!p.rewards_claimed());

        p.set_reward_tier(RewardTier::Silver);
        assert_eq!(p.claim_rewards(), Ok(RewardTier::Silver));
        assert!(p.rewards_claimed());
        assert!(matches!(
            p.claim_rewards(),
            Err(DomainError::AlreadyClaimed { .. })
        ));

        // Recalculating tiers never reopens a claim
        p.set_reward_tier(RewardTier::Gold);
        assert!(p.rewards_claimed());
        assert!(p.claim_rewards().is_err());
    }
}
