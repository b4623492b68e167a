//! WorldBossSpawn entity - per boss per zone spawn lifecycle
//!
//! Waiting -> Spawned -> Engaged -> (kill) -> Waiting. A spawned boss that
//! nobody engages can be despawned back to Waiting.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::ids::{BossId, ZoneId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BossSpawnState {
    Waiting,
    Spawned,
    Engaged,
}

impl BossSpawnState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Spawned => "spawned",
            Self::Engaged => "engaged",
        }
    }
}

impl std::fmt::Display for BossSpawnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive window in which a boss may appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl SpawnWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, DomainError> {
        if start > end {
            return Err(DomainError::validation(format!(
                "spawn window start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn length(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldBossSpawn {
    boss_id: BossId,
    zone_id: ZoneId,
    state: BossSpawnState,
    spawn_window: Option<SpawnWindow>,
    next_spawn_at: Option<DateTime<Utc>>,
    spawned_at: Option<DateTime<Utc>>,
    engaged_at: Option<DateTime<Utc>>,
    last_killed_at: Option<DateTime<Utc>>,
    kill_count: u32,
    revision: u64,
}

impl WorldBossSpawn {
    pub fn new(boss_id: BossId, zone_id: ZoneId) -> Self {
        Self {
            boss_id,
            zone_id,
            state: BossSpawnState::Waiting,
            spawn_window: None,
            next_spawn_at: None,
            spawned_at: None,
            engaged_at: None,
            last_killed_at: None,
            kill_count: 0,
            revision: 0,
        }
    }

    // Read accessors
    pub fn boss_id(&self) -> BossId {
        self.boss_id
    }

    pub fn zone_id(&self) -> ZoneId {
        self.zone_id
    }

    pub fn state(&self) -> BossSpawnState {
        self.state
    }

    pub fn spawn_window(&self) -> Option<SpawnWindow> {
        self.spawn_window
    }

    pub fn next_spawn_at(&self) -> Option<DateTime<Utc>> {
        self.next_spawn_at
    }

    pub fn spawned_at(&self) -> Option<DateTime<Utc>> {
        self.spawned_at
    }

    pub fn engaged_at(&self) -> Option<DateTime<Utc>> {
        self.engaged_at
    }

    pub fn last_killed_at(&self) -> Option<DateTime<Utc>> {
        self.last_killed_at
    }

    pub fn kill_count(&self) -> u32 {
        self.kill_count
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Set the concurrency token (for repository adapters).
    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }

    /// Replace the spawn window. Only allowed while waiting.
    pub fn set_spawn_window(&mut self, window: SpawnWindow) -> Result<(), DomainError> {
        self.require(BossSpawnState::Waiting, "set spawn window")?;
        self.spawn_window = Some(window);
        Ok(())
    }

    /// True when waiting, inside the window, and past any cooldown.
    pub fn can_spawn(&self, now: DateTime<Utc>) -> bool {
        self.state == BossSpawnState::Waiting
            && self.spawn_window.is_some_and(|w| w.contains(now))
            && self.next_spawn_at.map_or(true, |at| at <= now)
    }

    pub fn spawn(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.require(BossSpawnState::Waiting, "spawn")?;
        let window = self.spawn_window.ok_or_else(|| {
            DomainError::invalid_state_transition(format!(
                "boss {} in zone {} has no spawn window",
                self.boss_id, self.zone_id
            ))
        })?;
        if !window.contains(now) {
            return Err(DomainError::invalid_state_transition(format!(
                "boss {} in zone {} is outside its spawn window",
                self.boss_id, self.zone_id
            )));
        }
        if let Some(at) = self.next_spawn_at.filter(|at| *at > now) {
            return Err(DomainError::invalid_state_transition(format!(
                "boss {} in zone {} is on cooldown until {at}",
                self.boss_id, self.zone_id
            )));
        }
        self.state = BossSpawnState::Spawned;
        self.spawned_at = Some(now);
        self.engaged_at = None;
        Ok(())
    }

    pub fn engage(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.require(BossSpawnState::Spawned, "engage")?;
        self.state = BossSpawnState::Engaged;
        self.engaged_at = Some(now);
        Ok(())
    }

    /// Record a kill and start the cooldown.
    ///
    /// The next window opens at the end of the cooldown and keeps the
    /// previous window's length, or `default_window` when there was none.
    pub fn kill(
        &mut self,
        now: DateTime<Utc>,
        cooldown: Duration,
        default_window: Duration,
    ) -> Result<(), DomainError> {
        self.require(BossSpawnState::Engaged, "kill")?;
        let next = now + cooldown;
        let length = self
            .spawn_window
            .map_or(default_window, |w| w.length());
        self.state = BossSpawnState::Waiting;
        self.last_killed_at = Some(now);
        self.kill_count = self.kill_count.saturating_add(1);
        self.next_spawn_at = Some(next);
        self.spawn_window = Some(SpawnWindow {
            start: next,
            end: next + length,
        });
        self.spawned_at = None;
        self.engaged_at = None;
        Ok(())
    }

    /// Return a spawned or engaged boss to Waiting without a kill.
    pub fn despawn(&mut self) -> Result<(), DomainError> {
        if self.state == BossSpawnState::Waiting {
            return Err(DomainError::invalid_state_transition(format!(
                "boss {} in zone {} is not spawned",
                self.boss_id, self.zone_id
            )));
        }
        self.state = BossSpawnState::Waiting;
        self.spawned_at = None;
        self.engaged_at = None;
        Ok(())
    }

    fn require(&self, expected: BossSpawnState, action: &str) -> Result<(), DomainError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(DomainError::invalid_state_transition(format!(
                "cannot {action} boss {} in zone {} while {}",
                self.boss_id, self.zone_id, self.state
            )))
        }
    }
}
