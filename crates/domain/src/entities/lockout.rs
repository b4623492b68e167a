//! InstanceLockout entity - per character reentry and loot restriction
//!
//! Entry and loot are tracked separately: a locked character may re-enter
//! to help others while no longer being loot eligible. Expiry only moves
//! forward; removal is done by expiry sweeps or an explicit admin reset.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::ids::{BossId, CharacterId, InstanceDefId, InstanceGuid};
use crate::value_objects::{InstanceDifficulty, InstanceType, LockoutRules};

/// One lockout per character per instance definition per difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockoutKey {
    pub character_id: CharacterId,
    pub instance_def_id: InstanceDefId,
    pub difficulty: InstanceDifficulty,
}

impl LockoutKey {
    pub fn new(
        character_id: CharacterId,
        instance_def_id: InstanceDefId,
        difficulty: InstanceDifficulty,
    ) -> Self {
        Self {
            character_id,
            instance_def_id,
            difficulty,
        }
    }
}

impl fmt::Display for LockoutKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.character_id, self.instance_def_id, self.difficulty
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceLockout {
    key: LockoutKey,
    instance_type: InstanceType,
    expires_at: DateTime<Utc>,
    boss_kills: BTreeSet<BossId>,
    loot_eligible: bool,
    completion_count: u32,
    /// Always within `[floor, 1.0]`
    diminishing_factor: f64,
    extended: bool,
    extension_count: u32,
    instance_guid: Option<InstanceGuid>,
    created_at: DateTime<Utc>,
    revision: u64,
}

impl InstanceLockout {
    pub fn new(
        key: LockoutKey,
        instance_type: InstanceType,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            instance_type,
            expires_at,
            boss_kills: BTreeSet::new(),
            loot_eligible: true,
            completion_count: 0,
            diminishing_factor: 1.0,
            extended: false,
            extension_count: 0,
            instance_guid: None,
            created_at: now,
            revision: 0,
        }
    }

    // Read accessors
    pub fn key(&self) -> LockoutKey {
        self.key
    }

    pub fn character_id(&self) -> CharacterId {
        self.key.character_id
    }

    pub fn instance_def_id(&self) -> InstanceDefId {
        self.key.instance_def_id
    }

    pub fn difficulty(&self) -> InstanceDifficulty {
        self.key.difficulty
    }

    pub fn instance_type(&self) -> InstanceType {
        self.instance_type
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn boss_kills(&self) -> &BTreeSet<BossId> {
        &self.boss_kills
    }

    pub fn loot_eligible(&self) -> bool {
        self.loot_eligible
    }

    pub fn completion_count(&self) -> u32 {
        self.completion_count
    }

    pub fn diminishing_factor(&self) -> f64 {
        self.diminishing_factor
    }

    pub fn extended(&self) -> bool {
        self.extended
    }

    pub fn extension_count(&self) -> u32 {
        self.extension_count
    }

    pub fn instance_guid(&self) -> Option<InstanceGuid> {
        self.instance_guid
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Set the concurrency token (for repository adapters).
    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }

    /// Locked out while the expiry is still ahead of `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    /// Eligible for the expiry sweep. A row expiring exactly at `now` is kept.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    pub fn has_killed(&self, boss_id: BossId) -> bool {
        self.boss_kills.contains(&boss_id)
    }

    /// Returns true when the kill was new.
    pub fn record_boss_kill(&mut self, boss_id: BossId) -> bool {
        self.boss_kills.insert(boss_id)
    }

    pub fn mark_loot_received(&mut self) {
        self.loot_eligible = false;
    }

    /// Count one more completion and return the resulting reward factor.
    pub fn increment_completion(&mut self, rules: &LockoutRules) -> f64 {
        self.completion_count = self.completion_count.saturating_add(1);
        self.diminishing_factor = rules
            .next_factor(self.completion_count, self.diminishing_factor)
            .clamp(rules.diminishing_floor, 1.0);
        self.diminishing_factor
    }

    /// Push expiry out by exactly one week.
    pub fn extend(&mut self, rules: &LockoutRules) -> Result<(), DomainError> {
        if let Some(max) = rules.max_extensions {
            if self.extension_count >= max {
                return Err(DomainError::constraint(format!(
                    "lockout {} already extended {max} times",
                    self.key
                )));
            }
        }
        self.expires_at += Duration::weeks(1);
        self.extended = true;
        self.extension_count = self.extension_count.saturating_add(1);
        Ok(())
    }

    pub fn link_to_instance(&mut self, guid: InstanceGuid) {
        self.instance_guid = Some(guid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0)
            .single()
            .expect("valid test timestamp")
    }

    fn lockout() -> InstanceLockout {
        InstanceLockout::new(
            LockoutKey::new(
                CharacterId::new(),
                InstanceDefId::new(40),
                InstanceDifficulty::Mythic,
            ),
            InstanceType::Raid,
            now() + Duration::days(3),
            now(),
        )
    }

    #[test]
    fn new_lockout_is_loot_eligible_at_full_factor() {
        let l = lockout();
        assert!(l.loot_eligible());
        assert_eq!(l.diminishing_factor(), 1.0);
        assert!(l.boss_kills().is_empty());
        assert!(l.instance_guid().is_none());
    }

    #[test]
    fn activity_and_sweep_boundaries() {
        let l = lockout();
        let expiry = l.expires_at();
        assert!(l.is_active(expiry - Duration::seconds(1)));
        assert!(!l.is_active(expiry));
        assert!(!l.is_expired_at(expiry));
        assert!(l.is_expired_at(expiry + Duration::seconds(1)));
    }

    #[test]
    fn boss_kills_are_idempotent() {
        let mut l = lockout();
        assert!(l.record_boss_kill(BossId::new(1)));
        assert!(!l.record_boss_kill(BossId::new(1)));
        assert!(l.record_boss_kill(BossId::new(2)));
        assert_eq!(l.boss_kills().len(), 2);
        assert!(l.has_killed(BossId::new(2)));
        assert!(!l.has_killed(BossId::new(3)));
    }

    #[test]
    fn loot_is_independent_of_entry() {
        let mut l = lockout();
        l.mark_loot_received();
        assert!(!l.loot_eligible());
        assert!(l.is_active(now()));
    }

    #[test]
    fn completions_diminish_after_start() {
        let rules = LockoutRules::default();
        let mut l = lockout();
        for _ in 0..5 {
            assert_eq!(l.increment_completion(&rules), 1.0);
        }
        let sixth = l.increment_completion(&rules);
        assert!((sixth - 0.8).abs() < 1e-9);
        for _ in 0..20 {
            l.increment_completion(&rules);
        }
        assert_eq!(l.diminishing_factor(), rules.diminishing_floor);
        assert_eq!(l.completion_count(), 26);
    }

    #[test]
    fn extension_adds_one_week_and_respects_cap() {
        let mut rules = LockoutRules::default();
        rules.max_extensions = Some(2);
        let mut l = lockout();
        let original = l.expires_at();

        l.extend(&rules).expect("first");
        l.extend(&rules).expect("second");
        assert!(l.extended());
        assert_eq!(l.expires_at(), original + Duration::weeks(2));
        assert!(matches!(l.extend(&rules), Err(DomainError::Constraint(_))));
        assert_eq!(l.expires_at(), original + Duration::weeks(2));

        rules.max_extensions = None;
        l.extend(&rules).expect("unbounded");
        assert_eq!(l.extension_count(), 3);
    }

    #[test]
    fn linking_sets_run_guid() {
        let mut l = lockout();
        let guid = InstanceGuid::new();
        l.link_to_instance(guid);
        assert_eq!(l.instance_guid(), Some(guid));
    }
}
