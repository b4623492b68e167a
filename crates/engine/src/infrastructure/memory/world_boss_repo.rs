//! In-memory world boss spawn storage.

use async_trait::async_trait;
use dashmap::DashMap;
use timegate_domain::{BossId, BossSpawnState, WorldBossSpawn, ZoneId};

use super::{collect_where, compare_and_set, insert_if_absent};
use crate::infrastructure::ports::{RepoError, WorldBossRepo};

pub struct MemoryWorldBossRepo {
    rows: DashMap<(BossId, ZoneId), WorldBossSpawn>,
}

impl MemoryWorldBossRepo {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }

    fn sorted(mut spawns: Vec<WorldBossSpawn>) -> Vec<WorldBossSpawn> {
        spawns.sort_by_key(|s| (s.zone_id(), s.boss_id()));
        spawns
    }
}

impl Default for MemoryWorldBossRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorldBossRepo for MemoryWorldBossRepo {
    async fn get(
        &self,
        boss_id: BossId,
        zone_id: ZoneId,
    ) -> Result<Option<WorldBossSpawn>, RepoError> {
        Ok(self
            .rows
            .get(&(boss_id, zone_id))
            .map(|row| row.value().clone()))
    }

    async fn insert_if_absent(
        &self,
        spawn: &WorldBossSpawn,
    ) -> Result<WorldBossSpawn, RepoError> {
        let (stored, _) = insert_if_absent(&self.rows, (spawn.boss_id(), spawn.zone_id()), spawn);
        Ok(stored)
    }

    async fn compare_and_set(
        &self,
        spawn: &WorldBossSpawn,
        expected_revision: u64,
    ) -> Result<bool, RepoError> {
        Ok(compare_and_set(
            &self.rows,
            (spawn.boss_id(), spawn.zone_id()),
            spawn,
            expected_revision,
        ))
    }

    async fn list_for_zone(&self, zone_id: ZoneId) -> Result<Vec<WorldBossSpawn>, RepoError> {
        Ok(Self::sorted(collect_where(&self.rows, |s| {
            s.zone_id() == zone_id
        })))
    }

    async fn list_by_state(
        &self,
        state: BossSpawnState,
    ) -> Result<Vec<WorldBossSpawn>, RepoError> {
        Ok(Self::sorted(collect_where(&self.rows, |s| s.state() == state)))
    }
}
