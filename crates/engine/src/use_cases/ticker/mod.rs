//! Ticker use case.
//!
//! One `tick` drives every time-based transition:
//! - Fire due event schedules (claim -> create -> start)
//! - Spawn bosses whose window is open, despawn lapsed ones
//! - Fail overdue event instances
//! - Remove expired lockouts
//! - Purge old terminal event instances
//!
//! Each step is independent. A failing step is logged and counted and the
//! rest of the tick still runs. Every step is safe to run concurrently from
//! several processes.

mod trigger_policy;

pub use trigger_policy::TriggerPolicy;

use std::sync::Arc;

use chrono::Duration;
use timegate_domain::{
    BossId, DomainError, EventInstanceId, EventProgress, EventSchedule, ZoneId, ZoneInstanceId,
};
use tokio_util::sync::CancellationToken;

use crate::entities::{
    ContentError, EventInstanceManager, EventScheduler, LockoutEngine, WorldBossSpawnController,
};
use crate::infrastructure::catalog::ContentCatalog;
use crate::infrastructure::ports::ClockPort;

/// Shard that scheduled events open in.
pub const SCHEDULED_EVENT_SHARD: ZoneInstanceId = ZoneInstanceId::new(0);

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub events_started: Vec<EventInstanceId>,
    pub bosses_spawned: Vec<(BossId, ZoneId)>,
    pub bosses_despawned: Vec<(BossId, ZoneId)>,
    pub events_expired: Vec<EventInstanceId>,
    pub lockouts_removed: u64,
    pub instances_purged: u64,
    /// Steps or items that failed and were skipped
    pub failures: u32,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        self.events_started.is_empty()
            && self.bosses_spawned.is_empty()
            && self.bosses_despawned.is_empty()
            && self.events_expired.is_empty()
            && self.lockouts_removed == 0
            && self.instances_purged == 0
            && self.failures == 0
    }
}

/// Periodic driver for schedules, spawns and sweeps.
pub struct Ticker {
    scheduler: Arc<EventScheduler>,
    events: Arc<EventInstanceManager>,
    bosses: Arc<WorldBossSpawnController>,
    lockouts: Arc<LockoutEngine>,
    catalog: Arc<ContentCatalog>,
    policy: TriggerPolicy,
    clock: Arc<dyn ClockPort>,
    terminal_ttl: Duration,
}

impl Ticker {
    pub fn new(
        scheduler: Arc<EventScheduler>,
        events: Arc<EventInstanceManager>,
        bosses: Arc<WorldBossSpawnController>,
        lockouts: Arc<LockoutEngine>,
        catalog: Arc<ContentCatalog>,
        policy: TriggerPolicy,
        clock: Arc<dyn ClockPort>,
        terminal_ttl: Duration,
    ) -> Self {
        Self {
            scheduler,
            events,
            bosses,
            lockouts,
            catalog,
            policy,
            clock,
            terminal_ttl,
        }
    }

    pub async fn tick(&self) -> TickReport {
        let mut report = TickReport::default();

        self.fire_schedules(&mut report).await;
        self.spawn_bosses(&mut report).await;
        self.despawn_lapsed(&mut report).await;

        match self.events.expire_overdue().await {
            Ok(expired) => report.events_expired = expired,
            Err(e) => report.step_failed("expire overdue events", &e),
        }
        match self.lockouts.cleanup_expired().await {
            Ok(removed) => report.lockouts_removed = removed,
            Err(e) => report.step_failed("clean up expired lockouts", &e),
        }
        match self.events.purge_terminal(self.terminal_ttl).await {
            Ok(purged) => report.instances_purged = purged,
            Err(e) => report.step_failed("purge terminal events", &e),
        }

        if !report.is_idle() {
            tracing::info!(
                started = report.events_started.len(),
                spawned = report.bosses_spawned.len(),
                despawned = report.bosses_despawned.len(),
                expired = report.events_expired.len(),
                lockouts_removed = report.lockouts_removed,
                purged = report.instances_purged,
                failures = report.failures,
                "Tick complete"
            );
        }
        report
    }

    /// Tick every `period` until `cancel` fires.
    pub async fn run(&self, period: std::time::Duration, cancel: CancellationToken) {
        tracing::info!(period_secs = period.as_secs(), "Starting ticker");
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Ticker shutting down");
                    break;
                }
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    async fn fire_schedules(&self, report: &mut TickReport) {
        let due = match self.scheduler.get_due_schedules().await {
            Ok(due) => due,
            Err(e) => return report.step_failed("load due schedules", &e),
        };
        for schedule in due {
            match self.fire(&schedule).await {
                Ok(Some(id)) => report.events_started.push(id),
                Ok(None) => {}
                Err(e) => {
                    report.failures += 1;
                    tracing::warn!(
                        schedule = %schedule.key(),
                        error = %e,
                        "Failed to fire event schedule"
                    );
                }
            }
        }
    }

    async fn fire(&self, schedule: &EventSchedule) -> Result<Option<EventInstanceId>, ContentError> {
        let Some(definition) = self.catalog.event(schedule.event_def_id()) else {
            return Err(DomainError::configuration(format!(
                "no event definition {} in catalog",
                schedule.event_def_id()
            ))
            .into());
        };
        let next = self
            .policy
            .next_trigger_at(schedule.trigger(), self.clock.now());
        if self.scheduler.claim_due(schedule.key(), next).await?.is_none() {
            return Ok(None);
        }

        let instance = self
            .events
            .create(
                schedule.event_def_id(),
                schedule.zone_id(),
                SCHEDULED_EVENT_SHARD,
            )
            .await?;
        if definition.initial_phase > 0 {
            self.events
                .advance_phase(instance.id(), definition.initial_phase, EventProgress::new())
                .await?;
        }
        self.events
            .start(instance.id(), definition.duration())
            .await?;
        Ok(Some(instance.id()))
    }

    async fn spawn_bosses(&self, report: &mut TickReport) {
        let waiting = match self.bosses.get_waiting_bosses().await {
            Ok(waiting) => waiting,
            Err(e) => return report.step_failed("load waiting bosses", &e),
        };
        for boss in waiting {
            let (boss_id, zone_id) = (boss.boss_id(), boss.zone_id());
            match self.bosses.spawn(boss_id, zone_id).await {
                Ok(_) => report.bosses_spawned.push((boss_id, zone_id)),
                Err(e) if lost_race(&e) => {
                    tracing::debug!(boss = %boss_id, zone = %zone_id, "Boss already spawned elsewhere");
                }
                Err(e) => {
                    report.failures += 1;
                    tracing::warn!(boss = %boss_id, zone = %zone_id, error = %e, "Failed to spawn boss");
                }
            }
        }
    }

    async fn despawn_lapsed(&self, report: &mut TickReport) {
        let lapsed = match self.bosses.get_lapsed_spawns().await {
            Ok(lapsed) => lapsed,
            Err(e) => return report.step_failed("load lapsed spawns", &e),
        };
        for boss in lapsed {
            let (boss_id, zone_id) = (boss.boss_id(), boss.zone_id());
            match self.bosses.despawn(boss_id, zone_id).await {
                Ok(_) => report.bosses_despawned.push((boss_id, zone_id)),
                Err(e) if lost_race(&e) => {}
                Err(e) => {
                    report.failures += 1;
                    tracing::warn!(boss = %boss_id, zone = %zone_id, error = %e, "Failed to despawn boss");
                }
            }
        }
    }
}

impl TickReport {
    fn step_failed(&mut self, step: &'static str, error: &ContentError) {
        self.failures += 1;
        tracing::warn!(step, error = %error, "Tick step failed, continuing");
    }
}

/// Another sweeper moved the aggregate first.
fn lost_race(error: &ContentError) -> bool {
    matches!(
        error,
        ContentError::Domain(DomainError::InvalidStateTransition(_))
    )
}
