//! In-memory instance lockout storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use timegate_domain::{CharacterId, InstanceGuid, InstanceLockout, LockoutKey};

use super::{collect_where, compare_and_set, insert_if_absent};
use crate::infrastructure::ports::{LockoutRepo, RepoError};

pub struct MemoryLockoutRepo {
    rows: DashMap<LockoutKey, InstanceLockout>,
}

impl MemoryLockoutRepo {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }

    fn sorted(mut lockouts: Vec<InstanceLockout>) -> Vec<InstanceLockout> {
        lockouts.sort_by_key(|l| l.key());
        lockouts
    }

    fn remove_where(&self, remove: impl Fn(&InstanceLockout) -> bool) -> u64 {
        let mut removed = 0u64;
        self.rows.retain(|_, lockout| {
            if remove(lockout) {
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }
}

impl Default for MemoryLockoutRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockoutRepo for MemoryLockoutRepo {
    async fn get(&self, key: LockoutKey) -> Result<Option<InstanceLockout>, RepoError> {
        Ok(self.rows.get(&key).map(|row| row.value().clone()))
    }

    async fn insert_if_absent(
        &self,
        lockout: &InstanceLockout,
    ) -> Result<(InstanceLockout, bool), RepoError> {
        Ok(insert_if_absent(&self.rows, lockout.key(), lockout))
    }

    async fn compare_and_set(
        &self,
        lockout: &InstanceLockout,
        expected_revision: u64,
    ) -> Result<bool, RepoError> {
        Ok(compare_and_set(
            &self.rows,
            lockout.key(),
            lockout,
            expected_revision,
        ))
    }

    async fn delete(&self, key: LockoutKey) -> Result<bool, RepoError> {
        Ok(self.rows.remove(&key).is_some())
    }

    async fn delete_for_character(&self, character_id: CharacterId) -> Result<u64, RepoError> {
        Ok(self.remove_where(|l| l.character_id() == character_id))
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, RepoError> {
        Ok(self.remove_where(|l| l.is_expired_at(now)))
    }

    async fn list_for_character(
        &self,
        character_id: CharacterId,
    ) -> Result<Vec<InstanceLockout>, RepoError> {
        Ok(Self::sorted(collect_where(&self.rows, |l| {
            l.character_id() == character_id
        })))
    }

    async fn list_for_instance(
        &self,
        instance_guid: InstanceGuid,
    ) -> Result<Vec<InstanceLockout>, RepoError> {
        Ok(Self::sorted(collect_where(&self.rows, |l| {
            l.instance_guid() == Some(instance_guid)
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use timegate_domain::{InstanceDefId, InstanceDifficulty, InstanceType};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0)
            .single()
            .expect("valid test timestamp")
    }

    fn lockout_expiring_at(def: u32, expires_at: DateTime<Utc>) -> InstanceLockout {
        InstanceLockout::new(
            LockoutKey::new(
                CharacterId::new(),
                InstanceDefId::new(def),
                InstanceDifficulty::Normal,
            ),
            InstanceType::Dungeon,
            expires_at,
            base(),
        )
    }

    #[tokio::test]
    async fn compare_and_set_rejects_stale_revision() {
        let repo = MemoryLockoutRepo::new();
        let (mut stored, created) = repo
            .insert_if_absent(&lockout_expiring_at(1, base()))
            .await
            .expect("insert");
        assert!(created);

        stored.mark_loot_received();
        assert!(repo.compare_and_set(&stored, 0).await.expect("cas"));
        // Second writer still holds revision 0
        assert!(!repo.compare_and_set(&stored, 0).await.expect("cas"));

        let fresh = repo.get(stored.key()).await.expect("get").expect("row");
        assert_eq!(fresh.revision(), 1);
        assert!(!fresh.loot_eligible());
    }

    #[tokio::test]
    async fn insert_if_absent_returns_existing_row() {
        let repo = MemoryLockoutRepo::new();
        let first = lockout_expiring_at(1, base());
        repo.insert_if_absent(&first).await.expect("insert");

        let mut second = first.clone();
        second.mark_loot_received();
        let (stored, created) = repo.insert_if_absent(&second).await.expect("insert");
        assert!(!created);
        assert!(stored.loot_eligible());
    }

    proptest! {
        #[test]
        fn delete_expired_never_removes_unexpired_rows(
            offsets in proptest::collection::vec(-600i64..600, 1..40),
        ) {
            let rt = tokio::runtime::Runtime::new().expect("runtime");
            rt.block_on(async {
                let repo = MemoryLockoutRepo::new();
                let now = base();
                for (i, offset) in offsets.iter().enumerate() {
                    let lockout = lockout_expiring_at(i as u32, now + Duration::seconds(*offset));
                    repo.insert_if_absent(&lockout).await.expect("insert");
                }
                let expected_removed = offsets.iter().filter(|o| **o < 0).count() as u64;

                let removed = repo.delete_expired(now).await.expect("delete");
                prop_assert_eq!(removed, expected_removed);

                let remaining = collect_where(&repo.rows, |_| true);
                prop_assert_eq!(remaining.len(), offsets.len() - expected_removed as usize);
                for lockout in remaining {
                    prop_assert!(lockout.expires_at() >= now);
                }
                Ok(())
            })?;
        }
    }
}
