//! Participation tracking operations.

use std::sync::Arc;

use timegate_domain::{
    assign_reward_tiers, ranking_order, CharacterId, Contribution, ContributionRules,
    DomainError, EventInstanceId, Participation, RankingEntry, RewardAssignment, RewardTier,
};

use super::error::{ContentError, MAX_UPDATE_ATTEMPTS};
use crate::infrastructure::ports::{ClockPort, ParticipationRepo};

/// Outcome of one recorded contribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributionOutcome {
    pub participation: Participation,
    /// Points this contribution was worth
    pub points: u64,
    /// True when this contribution created the participation row
    pub joined: bool,
}

/// Per participant contribution and reward tiers for event instances.
pub struct ParticipationTracker {
    repo: Arc<dyn ParticipationRepo>,
    clock: Arc<dyn ClockPort>,
    rules: ContributionRules,
}

impl ParticipationTracker {
    pub fn new(
        repo: Arc<dyn ParticipationRepo>,
        clock: Arc<dyn ClockPort>,
        rules: ContributionRules,
    ) -> Self {
        Self { repo, clock, rules }
    }

    /// Explicit join. Fails with `AlreadyJoined` if the character participates.
    pub async fn join(
        &self,
        event_instance_id: EventInstanceId,
        character_id: CharacterId,
    ) -> Result<Participation, ContentError> {
        let row = Participation::new(event_instance_id, character_id, self.clock.now());
        let (stored, created) = self.repo.insert_if_absent(&row).await?;
        if !created {
            return Err(DomainError::already_joined(event_instance_id, character_id).into());
        }
        tracing::info!(
            event_instance = %event_instance_id,
            character = %character_id,
            "Character joined event"
        );
        Ok(stored)
    }

    pub async fn get(
        &self,
        event_instance_id: EventInstanceId,
        character_id: CharacterId,
    ) -> Result<Option<Participation>, ContentError> {
        Ok(self.repo.get(event_instance_id, character_id).await?)
    }

    pub async fn list_participants(
        &self,
        event_instance_id: EventInstanceId,
    ) -> Result<Vec<Participation>, ContentError> {
        Ok(self.repo.list_for_event(event_instance_id).await?)
    }

    /// Participants in contribution order: score descending, then earliest
    /// join, then character id.
    pub async fn rankings(
        &self,
        event_instance_id: EventInstanceId,
    ) -> Result<Vec<Participation>, ContentError> {
        let mut rows = self.repo.list_for_event(event_instance_id).await?;
        rows.sort_by(|a, b| ranking_order(&a.ranking_entry(), &b.ranking_entry()));
        Ok(rows)
    }

    // =========================================================================
    // Contributions (auto-join)
    // =========================================================================

    pub async fn record_kill(
        &self,
        event_instance_id: EventInstanceId,
        character_id: CharacterId,
    ) -> Result<ContributionOutcome, ContentError> {
        self.record(event_instance_id, character_id, Contribution::Kill)
            .await
    }

    pub async fn record_damage(
        &self,
        event_instance_id: EventInstanceId,
        character_id: CharacterId,
        amount: u64,
    ) -> Result<ContributionOutcome, ContentError> {
        self.record(event_instance_id, character_id, Contribution::Damage(amount))
            .await
    }

    pub async fn record_healing(
        &self,
        event_instance_id: EventInstanceId,
        character_id: CharacterId,
        amount: u64,
    ) -> Result<ContributionOutcome, ContentError> {
        self.record(event_instance_id, character_id, Contribution::Healing(amount))
            .await
    }

    /// Completing an objective twice awards points once.
    pub async fn complete_objective(
        &self,
        event_instance_id: EventInstanceId,
        character_id: CharacterId,
        objective_index: u32,
    ) -> Result<ContributionOutcome, ContentError> {
        self.record(
            event_instance_id,
            character_id,
            Contribution::Objective(objective_index),
        )
        .await
    }

    // =========================================================================
    // Rewards
    // =========================================================================

    /// Rank every participant and store their reward tier.
    ///
    /// The instance must already be complete. This tracker cannot see
    /// instance state, so callers go through
    /// `CombatRouter::calculate_reward_tiers` or call it right after
    /// completing the instance. Safe to re-run: tiers are recomputed from
    /// scores and claims are never reopened.
    pub async fn calculate_reward_tiers(
        &self,
        event_instance_id: EventInstanceId,
    ) -> Result<Vec<RewardAssignment>, ContentError> {
        let entries: Vec<RankingEntry> = self
            .repo
            .list_for_event(event_instance_id)
            .await?
            .iter()
            .map(Participation::ranking_entry)
            .collect();
        let assignments = assign_reward_tiers(entries);

        for assignment in &assignments {
            let tier = assignment.tier;
            self.update(event_instance_id, assignment.character_id, |p| {
                p.set_reward_tier(tier);
                Ok(())
            })
            .await?;
        }

        tracing::info!(
            event_instance = %event_instance_id,
            participants = assignments.len(),
            gold = assignments.iter().filter(|a| a.tier == RewardTier::Gold).count(),
            "Reward tiers calculated"
        );
        Ok(assignments)
    }

    /// Claim the computed tier exactly once.
    pub async fn claim_rewards(
        &self,
        event_instance_id: EventInstanceId,
        character_id: CharacterId,
    ) -> Result<RewardTier, ContentError> {
        let (_, tier) = self
            .update(event_instance_id, character_id, |p| p.claim_rewards())
            .await?;
        tracing::info!(
            event_instance = %event_instance_id,
            character = %character_id,
            tier = %tier,
            "Rewards claimed"
        );
        Ok(tier)
    }

    async fn record(
        &self,
        event_instance_id: EventInstanceId,
        character_id: CharacterId,
        contribution: Contribution,
    ) -> Result<ContributionOutcome, ContentError> {
        let now = self.clock.now();
        let (_, joined) = self
            .repo
            .insert_if_absent(&Participation::new(event_instance_id, character_id, now))
            .await?;
        let rules = &self.rules;
        let (participation, points) = self
            .update(event_instance_id, character_id, |p| {
                Ok(p.record(contribution, rules, now))
            })
            .await?;
        tracing::debug!(
            event_instance = %event_instance_id,
            character = %character_id,
            contribution = ?contribution,
            points,
            score = participation.contribution_score(),
            "Contribution recorded"
        );
        Ok(ContributionOutcome {
            participation,
            points,
            joined,
        })
    }

    async fn update<R, F>(
        &self,
        event_instance_id: EventInstanceId,
        character_id: CharacterId,
        mut apply: F,
    ) -> Result<(Participation, R), ContentError>
    where
        F: FnMut(&mut Participation) -> Result<R, DomainError> + Send,
    {
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let mut participation = self
                .repo
                .get(event_instance_id, character_id)
                .await?
                .ok_or_else(|| {
                    DomainError::not_found(
                        "Participation",
                        format!("{event_instance_id}/{character_id}"),
                    )
                })?;
            let expected = participation.revision();
            let out = apply(&mut participation)?;
            if self.repo.compare_and_set(&participation, expected).await? {
                return Ok((participation.with_revision(expected + 1), out));
            }
            tracing::debug!(
                event_instance = %event_instance_id,
                character = %character_id,
                attempt,
                "Participation changed concurrently, retrying"
            );
        }
        Err(ContentError::conflict(
            "Participation",
            format!("{event_instance_id}/{character_id}"),
        ))
    }
}
