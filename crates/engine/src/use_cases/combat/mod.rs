//! Combat routing use cases.
//!
//! Translates combat-engine reports into participation, event and lockout
//! operations. Contributions only count toward an active event instance.

use std::sync::Arc;

use timegate_domain::{
    BossId, CharacterId, DomainError, EventInstance, EventInstanceId, EventProgress,
    EventState, InstanceDefId, InstanceDifficulty, InstanceGuid, LockoutKey, RewardAssignment,
};

use crate::entities::{
    ContentError, ContributionOutcome, EventInstanceManager, LockoutEngine, ParticipationTracker,
};
use crate::infrastructure::catalog::ContentCatalog;

/// What a boss defeat inside a public event did to the event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventBossOutcome {
    PhaseAdvanced(EventInstance),
    Completed {
        instance: EventInstance,
        rewards: Vec<RewardAssignment>,
    },
}

/// Per-member result of a boss kill inside an instanced run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemberKill {
    pub character_id: CharacterId,
    /// False when this member's lockout already held the boss or the
    /// instance keeps no save
    pub newly_recorded: bool,
    pub loot_eligible: bool,
    pub reward_factor: f64,
}

pub struct CombatRouter {
    events: Arc<EventInstanceManager>,
    participation: Arc<ParticipationTracker>,
    lockouts: Arc<LockoutEngine>,
    catalog: Arc<ContentCatalog>,
}

impl CombatRouter {
    pub fn new(
        events: Arc<EventInstanceManager>,
        participation: Arc<ParticipationTracker>,
        lockouts: Arc<LockoutEngine>,
        catalog: Arc<ContentCatalog>,
    ) -> Self {
        Self {
            events,
            participation,
            lockouts,
            catalog,
        }
    }

    // =========================================================================
    // Event contributions
    // =========================================================================

    pub async fn kill(
        &self,
        event_instance_id: EventInstanceId,
        character_id: CharacterId,
    ) -> Result<ContributionOutcome, ContentError> {
        self.require_active(event_instance_id).await?;
        let outcome = self
            .participation
            .record_kill(event_instance_id, character_id)
            .await?;
        self.after_contribution(event_instance_id, &outcome).await?;
        Ok(outcome)
    }

    pub async fn damage(
        &self,
        event_instance_id: EventInstanceId,
        character_id: CharacterId,
        amount: u64,
    ) -> Result<ContributionOutcome, ContentError> {
        self.require_active(event_instance_id).await?;
        let outcome = self
            .participation
            .record_damage(event_instance_id, character_id, amount)
            .await?;
        self.after_contribution(event_instance_id, &outcome).await?;
        Ok(outcome)
    }

    pub async fn heal(
        &self,
        event_instance_id: EventInstanceId,
        character_id: CharacterId,
        amount: u64,
    ) -> Result<ContributionOutcome, ContentError> {
        self.require_active(event_instance_id).await?;
        let outcome = self
            .participation
            .record_healing(event_instance_id, character_id, amount)
            .await?;
        self.after_contribution(event_instance_id, &outcome).await?;
        Ok(outcome)
    }

    pub async fn objective_complete(
        &self,
        event_instance_id: EventInstanceId,
        character_id: CharacterId,
        objective_index: u32,
    ) -> Result<ContributionOutcome, ContentError> {
        self.require_active(event_instance_id).await?;
        let outcome = self
            .participation
            .complete_objective(event_instance_id, character_id, objective_index)
            .await?;
        self.after_contribution(event_instance_id, &outcome).await?;
        Ok(outcome)
    }

    // =========================================================================
    // Boss defeats
    // =========================================================================

    /// Boss of a public event died. With `next_phase` the event moves on,
    /// without it the event completes and reward tiers are assigned.
    pub async fn boss_defeated_in_event(
        &self,
        event_instance_id: EventInstanceId,
        boss_id: BossId,
        next_phase: Option<u32>,
    ) -> Result<EventBossOutcome, ContentError> {
        match next_phase {
            Some(phase) => {
                let instance = self
                    .events
                    .advance_phase(event_instance_id, phase, EventProgress::new())
                    .await?;
                tracing::info!(
                    event_instance = %event_instance_id,
                    boss = %boss_id,
                    phase,
                    "Event boss defeated, phase advanced"
                );
                Ok(EventBossOutcome::PhaseAdvanced(instance))
            }
            None => {
                let instance = self.events.complete(event_instance_id).await?;
                let rewards = self
                    .participation
                    .calculate_reward_tiers(event_instance_id)
                    .await?;
                tracing::info!(
                    event_instance = %event_instance_id,
                    boss = %boss_id,
                    "Final event boss defeated"
                );
                Ok(EventBossOutcome::Completed { instance, rewards })
            }
        }
    }

    /// Boss of an instanced run died. Every group member gets a lockout for
    /// the run (created on first kill), linked to `run`, holding the boss.
    ///
    /// Safe to replay: a member whose lockout already holds the boss is
    /// reported with `newly_recorded = false`.
    pub async fn boss_defeated_in_instance(
        &self,
        group: &[CharacterId],
        instance_def_id: InstanceDefId,
        difficulty: InstanceDifficulty,
        run: InstanceGuid,
        boss_id: BossId,
    ) -> Result<Vec<MemberKill>, ContentError> {
        let instance_type = self.catalog.instance_type(instance_def_id).ok_or_else(|| {
            DomainError::configuration(format!(
                "no instance definition {instance_def_id} in catalog"
            ))
        })?;

        let mut kills = Vec::with_capacity(group.len());
        for &character_id in group {
            let key = LockoutKey::new(character_id, instance_def_id, difficulty);
            let lockout = self
                .lockouts
                .get_or_create_lockout(key, instance_type)
                .await?;
            if !self.lockouts.is_locked_out(key).await? {
                // Unlocked content keeps no save
                tracing::debug!(
                    lockout = %key,
                    boss = %boss_id,
                    "Instance is unlocked, kill not saved"
                );
                kills.push(MemberKill {
                    character_id,
                    newly_recorded: false,
                    loot_eligible: true,
                    reward_factor: 1.0,
                });
                continue;
            }
            if lockout.instance_guid() != Some(run) {
                self.lockouts.link_to_instance(key, run).await?;
            }
            let newly_recorded = self.lockouts.record_boss_kill(key, boss_id).await?;
            kills.push(MemberKill {
                character_id,
                newly_recorded,
                loot_eligible: self.lockouts.is_loot_eligible(key).await?,
                reward_factor: self.lockouts.get_reward_factor(key).await?,
            });
        }

        tracing::info!(
            instance_def = %instance_def_id,
            difficulty = ?difficulty,
            run = %run,
            boss = %boss_id,
            members = group.len(),
            "Instance boss kill recorded for group"
        );
        Ok(kills)
    }

    /// Recompute reward tiers for a completed event instance.
    pub async fn calculate_reward_tiers(
        &self,
        event_instance_id: EventInstanceId,
    ) -> Result<Vec<RewardAssignment>, ContentError> {
        let instance = self
            .events
            .get(event_instance_id)
            .await?
            .ok_or_else(|| DomainError::not_found("EventInstance", event_instance_id))?;
        if instance.state() != EventState::Complete {
            return Err(DomainError::invalid_state_transition(format!(
                "cannot calculate rewards for event {event_instance_id} in state {}",
                instance.state()
            ))
            .into());
        }
        self.participation
            .calculate_reward_tiers(event_instance_id)
            .await
    }

    async fn require_active(&self, event_instance_id: EventInstanceId) -> Result<(), ContentError> {
        let instance = self
            .events
            .get(event_instance_id)
            .await?
            .ok_or_else(|| DomainError::not_found("EventInstance", event_instance_id))?;
        if !instance.is_active() {
            return Err(DomainError::invalid_state_transition(format!(
                "cannot record contributions for event {event_instance_id} in state {}",
                instance.state()
            ))
            .into());
        }
        Ok(())
    }

    /// A new participant changes the head count, so difficulty is rescaled.
    async fn after_contribution(
        &self,
        event_instance_id: EventInstanceId,
        outcome: &ContributionOutcome,
    ) -> Result<(), ContentError> {
        if outcome.joined {
            self.events
                .update_participant_count(event_instance_id)
                .await?;
        }
        Ok(())
    }
}
