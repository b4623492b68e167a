//! In-memory event schedule storage.

use async_trait::async_trait;
use dashmap::DashMap;
use timegate_domain::{EventSchedule, ScheduleKey};

use super::{collect_where, compare_and_set, insert_if_absent};
use crate::infrastructure::ports::{EventScheduleRepo, RepoError};

pub struct MemoryEventScheduleRepo {
    rows: DashMap<ScheduleKey, EventSchedule>,
}

impl MemoryEventScheduleRepo {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }

    fn sorted(mut schedules: Vec<EventSchedule>) -> Vec<EventSchedule> {
        schedules.sort_by_key(|s| s.key());
        schedules
    }
}

impl Default for MemoryEventScheduleRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventScheduleRepo for MemoryEventScheduleRepo {
    async fn get(&self, key: ScheduleKey) -> Result<Option<EventSchedule>, RepoError> {
        Ok(self.rows.get(&key).map(|row| row.value().clone()))
    }

    async fn insert(&self, schedule: &EventSchedule) -> Result<bool, RepoError> {
        let (_, created) = insert_if_absent(&self.rows, schedule.key(), schedule);
        Ok(created)
    }

    async fn compare_and_set(
        &self,
        schedule: &EventSchedule,
        expected_revision: u64,
    ) -> Result<bool, RepoError> {
        Ok(compare_and_set(
            &self.rows,
            schedule.key(),
            schedule,
            expected_revision,
        ))
    }

    async fn list(&self) -> Result<Vec<EventSchedule>, RepoError> {
        Ok(Self::sorted(collect_where(&self.rows, |_| true)))
    }

    async fn list_enabled(&self) -> Result<Vec<EventSchedule>, RepoError> {
        Ok(Self::sorted(collect_where(&self.rows, |s| s.is_enabled())))
    }
}
