//! In-memory repository implementations.
//!
//! Backed by `dashmap`. A compare-and-set holds the shard write lock for
//! the key while it checks and replaces the row, so it is atomic with
//! respect to every other call on the same key.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use timegate_domain::{EventInstance, EventSchedule, InstanceLockout, Participation, WorldBossSpawn};

mod event_instance_repo;
mod lockout_repo;
mod participation_repo;
mod schedule_repo;
mod world_boss_repo;

pub use event_instance_repo::MemoryEventInstanceRepo;
pub use lockout_repo::MemoryLockoutRepo;
pub use participation_repo::MemoryParticipationRepo;
pub use schedule_repo::MemoryEventScheduleRepo;
pub use world_boss_repo::MemoryWorldBossRepo;

/// Create all in-memory repositories.
pub struct MemoryRepositories {
    pub event_instance: Arc<MemoryEventInstanceRepo>,
    pub participation: Arc<MemoryParticipationRepo>,
    pub schedule: Arc<MemoryEventScheduleRepo>,
    pub world_boss: Arc<MemoryWorldBossRepo>,
    pub lockout: Arc<MemoryLockoutRepo>,
}

impl MemoryRepositories {
    pub fn new() -> Self {
        Self {
            event_instance: Arc::new(MemoryEventInstanceRepo::new()),
            participation: Arc::new(MemoryParticipationRepo::new()),
            schedule: Arc::new(MemoryEventScheduleRepo::new()),
            world_boss: Arc::new(MemoryWorldBossRepo::new()),
            lockout: Arc::new(MemoryLockoutRepo::new()),
        }
    }
}

impl Default for MemoryRepositories {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Shared helpers
// =============================================================================

/// Aggregates that carry an optimistic concurrency token.
trait Revisioned: Clone {
    fn revision(&self) -> u64;
    fn with_revision(self, revision: u64) -> Self;
}

macro_rules! impl_revisioned {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Revisioned for $ty {
                fn revision(&self) -> u64 {
                    <$ty>::revision(self)
                }

                fn with_revision(self, revision: u64) -> Self {
                    <$ty>::with_revision(self, revision)
                }
            }
        )*
    };
}

impl_revisioned!(
    EventInstance,
    Participation,
    EventSchedule,
    WorldBossSpawn,
    InstanceLockout,
);

fn compare_and_set<K, T>(map: &DashMap<K, T>, key: K, value: &T, expected_revision: u64) -> bool
where
    K: Eq + Hash,
    T: Revisioned,
{
    match map.get_mut(&key) {
        Some(mut stored) if stored.revision() == expected_revision => {
            *stored = value.clone().with_revision(expected_revision + 1);
            true
        }
        _ => false,
    }
}

fn insert_if_absent<K, T>(map: &DashMap<K, T>, key: K, value: &T) -> (T, bool)
where
    K: Eq + Hash,
    T: Clone,
{
    match map.entry(key) {
        Entry::Occupied(existing) => (existing.get().clone(), false),
        Entry::Vacant(slot) => {
            slot.insert(value.clone());
            (value.clone(), true)
        }
    }
}

fn collect_where<K, T>(map: &DashMap<K, T>, keep: impl Fn(&T) -> bool) -> Vec<T>
where
    K: Eq + Hash,
    T: Clone,
{
    map.iter()
        .filter(|entry| keep(entry.value()))
        .map(|entry| entry.value().clone())
        .collect()
}
