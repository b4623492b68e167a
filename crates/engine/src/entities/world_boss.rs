//! World boss spawn operations.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use timegate_domain::{
    BossId, BossSpawnState, DomainError, SpawnWindow, WorldBossSpawn, ZoneId,
};

use super::error::{ContentError, MAX_UPDATE_ATTEMPTS};
use crate::infrastructure::ports::{ClockPort, WorldBossRepo};

/// Spawn lifecycle for world bosses: `Waiting -> Spawned -> Engaged -> Waiting`.
///
/// Nothing here self-schedules. A periodic sweep asks for
/// [`get_waiting_bosses`](Self::get_waiting_bosses) and calls `spawn` on
/// each. Bosses are never retired; every kill opens a future window.
pub struct WorldBossSpawnController {
    repo: Arc<dyn WorldBossRepo>,
    clock: Arc<dyn ClockPort>,
    /// Window length used after a kill when no window was ever set
    default_window: Duration,
}

impl WorldBossSpawnController {
    pub fn new(
        repo: Arc<dyn WorldBossRepo>,
        clock: Arc<dyn ClockPort>,
        default_window: Duration,
    ) -> Self {
        Self {
            repo,
            clock,
            default_window,
        }
    }

    /// Get or create the spawn record. New records start `Waiting`.
    pub async fn create_boss_spawn(
        &self,
        boss_id: BossId,
        zone_id: ZoneId,
    ) -> Result<WorldBossSpawn, ContentError> {
        let spawn = self
            .repo
            .insert_if_absent(&WorldBossSpawn::new(boss_id, zone_id))
            .await?;
        Ok(spawn)
    }

    pub async fn get(
        &self,
        boss_id: BossId,
        zone_id: ZoneId,
    ) -> Result<Option<WorldBossSpawn>, ContentError> {
        Ok(self.repo.get(boss_id, zone_id).await?)
    }

    pub async fn list_for_zone(&self, zone_id: ZoneId) -> Result<Vec<WorldBossSpawn>, ContentError> {
        Ok(self.repo.list_for_zone(zone_id).await?)
    }

    pub async fn set_spawn_window(
        &self,
        boss_id: BossId,
        zone_id: ZoneId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<WorldBossSpawn, ContentError> {
        let window = SpawnWindow::new(start, end)?;
        self.update(boss_id, zone_id, |b| b.set_spawn_window(window))
            .await
    }

    /// Waiting bosses that may spawn right now.
    pub async fn get_waiting_bosses(&self) -> Result<Vec<WorldBossSpawn>, ContentError> {
        let now = self.clock.now();
        Ok(self
            .repo
            .list_by_state(BossSpawnState::Waiting)
            .await?
            .into_iter()
            .filter(|b| b.can_spawn(now))
            .collect())
    }

    /// Spawned bosses nobody engaged before their window closed.
    pub async fn get_lapsed_spawns(&self) -> Result<Vec<WorldBossSpawn>, ContentError> {
        let now = self.clock.now();
        Ok(self
            .repo
            .list_by_state(BossSpawnState::Spawned)
            .await?
            .into_iter()
            .filter(|b| b.spawn_window().is_some_and(|w| w.end() < now))
            .collect())
    }

    pub async fn spawn(
        &self,
        boss_id: BossId,
        zone_id: ZoneId,
    ) -> Result<WorldBossSpawn, ContentError> {
        let now = self.clock.now();
        let spawn = self.update(boss_id, zone_id, |b| b.spawn(now)).await?;
        tracing::info!(boss = %boss_id, zone = %zone_id, "World boss spawned");
        Ok(spawn)
    }

    /// First player aggro.
    pub async fn engage(
        &self,
        boss_id: BossId,
        zone_id: ZoneId,
    ) -> Result<WorldBossSpawn, ContentError> {
        let now = self.clock.now();
        let spawn = self.update(boss_id, zone_id, |b| b.engage(now)).await?;
        tracing::info!(boss = %boss_id, zone = %zone_id, "World boss engaged");
        Ok(spawn)
    }

    /// Record a kill and schedule the next spawn `cooldown_hours` from now.
    pub async fn kill(
        &self,
        boss_id: BossId,
        zone_id: ZoneId,
        cooldown_hours: u32,
    ) -> Result<WorldBossSpawn, ContentError> {
        let now = self.clock.now();
        let cooldown = Duration::hours(i64::from(cooldown_hours));
        let default_window = self.default_window;
        let spawn = self
            .update(boss_id, zone_id, |b| b.kill(now, cooldown, default_window))
            .await?;
        tracing::info!(
            boss = %boss_id,
            zone = %zone_id,
            kill_count = spawn.kill_count(),
            next_spawn_at = ?spawn.next_spawn_at(),
            "World boss killed"
        );
        Ok(spawn)
    }

    /// Return a spawned or engaged boss to `Waiting` without a kill.
    pub async fn despawn(
        &self,
        boss_id: BossId,
        zone_id: ZoneId,
    ) -> Result<WorldBossSpawn, ContentError> {
        let spawn = self.update(boss_id, zone_id, |b| b.despawn()).await?;
        tracing::info!(boss = %boss_id, zone = %zone_id, "World boss despawned");
        Ok(spawn)
    }

    async fn update<F>(
        &self,
        boss_id: BossId,
        zone_id: ZoneId,
        mut apply: F,
    ) -> Result<WorldBossSpawn, ContentError>
    where
        F: FnMut(&mut WorldBossSpawn) -> Result<(), DomainError> + Send,
    {
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let mut spawn = self
                .repo
                .get(boss_id, zone_id)
                .await?
                .ok_or_else(|| {
                    DomainError::not_found("WorldBossSpawn", format!("{boss_id}@{zone_id}"))
                })?;
            let expected = spawn.revision();
            apply(&mut spawn)?;
            if self.repo.compare_and_set(&spawn, expected).await? {
                return Ok(spawn.with_revision(expected + 1));
            }
            tracing::debug!(
                boss = %boss_id,
                zone = %zone_id,
                attempt,
                "Boss spawn changed concurrently, retrying"
            );
        }
        Err(ContentError::conflict(
            "WorldBossSpawn",
            format!("{boss_id}@{zone_id}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::infrastructure::clock::{FixedClock, ManualClock};
    use crate::infrastructure::memory::MemoryWorldBossRepo;
    use crate::infrastructure::ports::MockWorldBossRepo;

    const BOSS: BossId = BossId::new(7);
    const ZONE: ZoneId = ZoneId::new(12);

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0)
            .single()
            .expect("valid test timestamp")
    }

    #[tokio::test]
    async fn create_is_idempotent() {
        let controller = WorldBossSpawnController::new(
            Arc::new(MemoryWorldBossRepo::new()),
            Arc::new(FixedClock(now())),
            Duration::hours(1),
        );
        let first = controller.create_boss_spawn(BOSS, ZONE).await.expect("create");
        controller
            .set_spawn_window(BOSS, ZONE, now(), now() + Duration::hours(1))
            .await
            .expect("window");
        let second = controller.create_boss_spawn(BOSS, ZONE).await.expect("create");

        assert_eq!(first.state(), BossSpawnState::Waiting);
        assert!(second.spawn_window().is_some());
        assert_eq!(controller.list_for_zone(ZONE).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn lifecycle_through_sweep_queries() {
        let clock = Arc::new(ManualClock::new(now()));
        let controller = WorldBossSpawnController::new(
            Arc::new(MemoryWorldBossRepo::new()),
            clock.clone(),
            Duration::hours(1),
        );
        controller.create_boss_spawn(BOSS, ZONE).await.expect("create");
        controller
            .set_spawn_window(
                BOSS,
                ZONE,
                now() + Duration::minutes(10),
                now() + Duration::minutes(40),
            )
            .await
            .expect("window");

        assert!(controller.get_waiting_bosses().await.expect("waiting").is_empty());
        assert!(controller.spawn(BOSS, ZONE).await.is_err());

        clock.advance(Duration::minutes(15));
        let waiting = controller.get_waiting_bosses().await.expect("waiting");
        assert_eq!(waiting.len(), 1);
        controller.spawn(BOSS, ZONE).await.expect("spawn");
        controller.engage(BOSS, ZONE).await.expect("engage");

        clock.advance(Duration::minutes(5));
        let killed = controller.kill(BOSS, ZONE, 6).await.expect("kill");
        assert_eq!(killed.state(), BossSpawnState::Waiting);
        assert_eq!(killed.next_spawn_at(), Some(clock.now() + Duration::hours(6)));
        assert!(controller.get_waiting_bosses().await.expect("waiting").is_empty());
    }

    #[tokio::test]
    async fn lapsed_spawn_can_be_despawned() {
        let clock = Arc::new(ManualClock::new(now()));
        let controller = WorldBossSpawnController::new(
            Arc::new(MemoryWorldBossRepo::new()),
            clock.clone(),
            Duration::hours(1),
        );
        controller.create_boss_spawn(BOSS, ZONE).await.expect("create");
        controller
            .set_spawn_window(BOSS, ZONE, now(), now() + Duration::minutes(30))
            .await
            .expect("window");
        controller.spawn(BOSS, ZONE).await.expect("spawn");

        assert!(controller.get_lapsed_spawns().await.expect("lapsed").is_empty());
        clock.advance(Duration::minutes(31));
        let lapsed = controller.get_lapsed_spawns().await.expect("lapsed");
        assert_eq!(lapsed.len(), 1);

        let despawned = controller.despawn(BOSS, ZONE).await.expect("despawn");
        assert_eq!(despawned.state(), BossSpawnState::Waiting);
        assert_eq!(despawned.kill_count(), 0);
    }

    #[tokio::test]
    async fn concurrent_spawn_surfaces_invalid_state_on_retry() {
        let mut waiting = WorldBossSpawn::new(BOSS, ZONE);
        waiting
            .set_spawn_window(
                SpawnWindow::new(now(), now() + Duration::hours(1)).expect("window"),
            )
            .expect("set");
        let mut spawned = waiting.clone();
        spawned.spawn(now()).expect("spawn");
        let spawned = spawned.with_revision(1);

        let mut repo = MockWorldBossRepo::new();
        let mut reads = vec![spawned, waiting];
        repo.expect_get()
            .times(2)
            .returning(move |_, _| Ok(reads.pop()));
        repo.expect_compare_and_set()
            .times(1)
            .returning(|_, _| Ok(false));

        let controller = WorldBossSpawnController::new(
            Arc::new(repo),
            Arc::new(FixedClock(now())),
            Duration::hours(1),
        );
        let result = controller.spawn(BOSS, ZONE).await;

        assert!(matches!(
            result,
            Err(ContentError::Domain(DomainError::InvalidStateTransition(_)))
        ));
    }
}
