//! Instance lockout operations.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use timegate_domain::{
    BossId, CharacterId, DomainError, ExpiryRule, InstanceGuid, InstanceLockout, InstanceType,
    LockoutKey, LockoutRules, ResetClock,
};

use super::error::{ContentError, MAX_UPDATE_ATTEMPTS};
use crate::infrastructure::ports::{ClockPort, LockoutRepo};

/// Per character instance reentry restrictions.
///
/// ## Entry vs loot
///
/// A lockout blocks entry until it expires. Loot eligibility is tracked
/// separately so a locked character can still re-enter to help a group.
///
/// ## Soft lockouts
///
/// Mythic dungeons allow reentry but every completion past the configured
/// start multiplies the reward factor down toward a floor. The factor is
/// only stored here; the reward service applies it.
///
/// ## Stale rows
///
/// A row whose expiry has passed is treated as absent by every query and
/// every mutation, which fail with `NotFound`. The next get-or-create
/// replaces it in place, and `cleanup_expired` removes whatever is left.
pub struct LockoutEngine {
    repo: Arc<dyn LockoutRepo>,
    clock: Arc<dyn ClockPort>,
    reset_clock: ResetClock,
    rules: LockoutRules,
}

impl LockoutEngine {
    pub fn new(
        repo: Arc<dyn LockoutRepo>,
        clock: Arc<dyn ClockPort>,
        reset_clock: ResetClock,
        rules: LockoutRules,
    ) -> Self {
        Self {
            repo,
            clock,
            reset_clock,
            rules,
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get(&self, key: LockoutKey) -> Result<Option<InstanceLockout>, ContentError> {
        Ok(self.repo.get(key).await?)
    }

    /// True iff an unexpired lockout exists.
    pub async fn is_locked_out(&self, key: LockoutKey) -> Result<bool, ContentError> {
        Ok(self.active(key).await?.is_some())
    }

    pub async fn list_for_character(
        &self,
        character_id: CharacterId,
    ) -> Result<Vec<InstanceLockout>, ContentError> {
        Ok(self.repo.list_for_character(character_id).await?)
    }

    pub async fn killed_bosses(&self, key: LockoutKey) -> Result<BTreeSet<BossId>, ContentError> {
        Ok(self
            .active(key)
            .await?
            .map(|l| l.boss_kills().clone())
            .unwrap_or_default())
    }

    pub async fn is_boss_killed(
        &self,
        key: LockoutKey,
        boss_id: BossId,
    ) -> Result<bool, ContentError> {
        Ok(self
            .active(key)
            .await?
            .is_some_and(|l| l.has_killed(boss_id)))
    }

    /// Characters without an active lockout are always loot eligible.
    pub async fn is_loot_eligible(&self, key: LockoutKey) -> Result<bool, ContentError> {
        Ok(self.active(key).await?.map_or(true, |l| l.loot_eligible()))
    }

    /// Reward multiplier for the next completion; 1.0 without a lockout.
    pub async fn get_reward_factor(&self, key: LockoutKey) -> Result<f64, ContentError> {
        Ok(self
            .active(key)
            .await?
            .map_or(1.0, |l| l.diminishing_factor()))
    }

    /// Every character sharing one instance save.
    pub async fn get_characters_for_instance(
        &self,
        instance_guid: InstanceGuid,
    ) -> Result<Vec<CharacterId>, ContentError> {
        let now = self.clock.now();
        let mut characters: Vec<CharacterId> = self
            .repo
            .list_for_instance(instance_guid)
            .await?
            .into_iter()
            .filter(|l| l.is_active(now))
            .map(|l| l.character_id())
            .collect();
        characters.sort();
        characters.dedup();
        Ok(characters)
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Create a lockout, failing with `AlreadyExists` if one is active.
    pub async fn create_lockout(
        &self,
        key: LockoutKey,
        instance_type: InstanceType,
    ) -> Result<InstanceLockout, ContentError> {
        let (lockout, created) = self.ensure(key, instance_type).await?;
        if !created {
            return Err(DomainError::already_exists("InstanceLockout", key).into());
        }
        Ok(lockout)
    }

    /// Return the active lockout, creating it on first entry.
    pub async fn get_or_create_lockout(
        &self,
        key: LockoutKey,
        instance_type: InstanceType,
    ) -> Result<InstanceLockout, ContentError> {
        let (lockout, _) = self.ensure(key, instance_type).await?;
        Ok(lockout)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add a boss to the kill set. Returns false when it was already there.
    pub async fn record_boss_kill(
        &self,
        key: LockoutKey,
        boss_id: BossId,
    ) -> Result<bool, ContentError> {
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let mut lockout = self.require(key).await?;
            let expected = lockout.revision();
            if !lockout.record_boss_kill(boss_id) {
                return Ok(false);
            }
            if self.repo.compare_and_set(&lockout, expected).await? {
                tracing::info!(lockout = %key, boss = %boss_id, "Boss kill recorded");
                return Ok(true);
            }
            tracing::debug!(lockout = %key, attempt, "Lockout changed concurrently, retrying");
        }
        Err(ContentError::conflict("InstanceLockout", key))
    }

    pub async fn mark_loot_received(&self, key: LockoutKey) -> Result<InstanceLockout, ContentError> {
        let (lockout, ()) = self.update(key, |l| l.mark_loot_received()).await?;
        Ok(lockout)
    }

    /// Count a completion and return the new reward factor.
    pub async fn increment_completion(&self, key: LockoutKey) -> Result<f64, ContentError> {
        let rules = &self.rules;
        let (lockout, factor) = self.update(key, |l| l.increment_completion(rules)).await?;
        tracing::debug!(
            lockout = %key,
            completions = lockout.completion_count(),
            factor,
            "Completion recorded"
        );
        Ok(factor)
    }

    /// Push expiry out by one week, up to the configured number of extensions.
    pub async fn extend_lockout(&self, key: LockoutKey) -> Result<InstanceLockout, ContentError> {
        let rules = &self.rules;
        let (lockout, ()) = self.try_update(key, |l| l.extend(rules)).await?;
        tracing::info!(
            lockout = %key,
            expires_at = %lockout.expires_at(),
            extensions = lockout.extension_count(),
            "Lockout extended"
        );
        Ok(lockout)
    }

    pub async fn link_to_instance(
        &self,
        key: LockoutKey,
        instance_guid: InstanceGuid,
    ) -> Result<InstanceLockout, ContentError> {
        let (lockout, ()) = self.update(key, |l| l.link_to_instance(instance_guid)).await?;
        Ok(lockout)
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Admin reset of a single lockout. Returns whether a row was removed.
    pub async fn reset_lockout(&self, key: LockoutKey) -> Result<bool, ContentError> {
        let removed = self.repo.delete(key).await?;
        tracing::info!(lockout = %key, removed, "Lockout reset");
        Ok(removed)
    }

    /// Admin reset of every lockout a character holds.
    pub async fn reset_character_lockouts(
        &self,
        character_id: CharacterId,
    ) -> Result<u64, ContentError> {
        let removed = self.repo.delete_for_character(character_id).await?;
        tracing::info!(character = %character_id, removed, "Character lockouts reset");
        Ok(removed)
    }

    /// Remove rows with `expires_at < now`.
    pub async fn cleanup_expired(&self) -> Result<u64, ContentError> {
        let now = self.clock.now();
        let removed = self.repo.delete_expired(now).await?;
        if removed > 0 {
            tracing::info!(removed, "Expired lockouts cleaned up");
        }
        Ok(removed)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn active(&self, key: LockoutKey) -> Result<Option<InstanceLockout>, ContentError> {
        let now = self.clock.now();
        Ok(self.repo.get(key).await?.filter(|l| l.is_active(now)))
    }

    async fn require(&self, key: LockoutKey) -> Result<InstanceLockout, ContentError> {
        self.active(key)
            .await?
            .ok_or_else(|| DomainError::not_found("InstanceLockout", key).into())
    }

    fn fresh_lockout(
        &self,
        key: LockoutKey,
        instance_type: InstanceType,
        now: DateTime<Utc>,
    ) -> Result<InstanceLockout, ContentError> {
        let expiry = self
            .rules
            .expiry_for(instance_type, key.difficulty, now, &self.reset_clock)?;
        if expiry.rule == ExpiryRule::FallbackDailyReset {
            tracing::warn!(
                lockout = %key,
                instance_type = %instance_type,
                expires_at = %expiry.expires_at,
                "Unrecognized instance type, falling back to daily reset"
            );
        }
        Ok(InstanceLockout::new(
            key,
            instance_type,
            expiry.expires_at,
            now,
        ))
    }

    /// Returns the active lockout and whether this call created it.
    async fn ensure(
        &self,
        key: LockoutKey,
        instance_type: InstanceType,
    ) -> Result<(InstanceLockout, bool), ContentError> {
        let now = self.clock.now();
        let fresh = self.fresh_lockout(key, instance_type, now)?;
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let (stored, created) = self.repo.insert_if_absent(&fresh).await?;
            if created {
                tracing::info!(
                    lockout = %key,
                    expires_at = %stored.expires_at(),
                    "Lockout created"
                );
                return Ok((stored, true));
            }
            if stored.is_active(now) {
                return Ok((stored, false));
            }
            // Leftover expired row the sweep has not removed yet
            let expected = stored.revision();
            if self.repo.compare_and_set(&fresh, expected).await? {
                tracing::info!(
                    lockout = %key,
                    expires_at = %fresh.expires_at(),
                    "Expired lockout replaced"
                );
                return Ok((fresh.with_revision(expected + 1), true));
            }
            tracing::debug!(lockout = %key, attempt, "Lockout changed concurrently, retrying");
        }
        Err(ContentError::conflict("InstanceLockout", key))
    }

    async fn update<R, F>(
        &self,
        key: LockoutKey,
        mut apply: F,
    ) -> Result<(InstanceLockout, R), ContentError>
    where
        F: FnMut(&mut InstanceLockout) -> R + Send,
    {
        self.try_update(key, |l| Ok(apply(l))).await
    }

    async fn try_update<R, F>(
        &self,
        key: LockoutKey,
        mut apply: F,
    ) -> Result<(InstanceLockout, R), ContentError>
    where
        F: FnMut(&mut InstanceLockout) -> Result<R, DomainError> + Send,
    {
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let mut lockout = self.require(key).await?;
            let expected = lockout.revision();
            let out = apply(&mut lockout)?;
            if self.repo.compare_and_set(&lockout, expected).await? {
                return Ok((lockout.with_revision(expected + 1), out));
            }
            tracing::debug!(lockout = %key, attempt, "Lockout changed concurrently, retrying");
        }
        Err(ContentError::conflict("InstanceLockout", key))
    }
}
