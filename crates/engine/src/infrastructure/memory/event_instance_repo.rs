//! In-memory event instance storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use timegate_domain::{EventInstance, EventInstanceId, EventState, ZoneId};

use super::{collect_where, compare_and_set};
use crate::infrastructure::ports::{EventInstanceRepo, RepoError};

pub struct MemoryEventInstanceRepo {
    rows: DashMap<EventInstanceId, EventInstance>,
}

impl MemoryEventInstanceRepo {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }

    fn sorted(mut instances: Vec<EventInstance>) -> Vec<EventInstance> {
        instances.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(&b.id()))
        });
        instances
    }
}

impl Default for MemoryEventInstanceRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventInstanceRepo for MemoryEventInstanceRepo {
    async fn get(&self, id: EventInstanceId) -> Result<Option<EventInstance>, RepoError> {
        Ok(self.rows.get(&id).map(|row| row.value().clone()))
    }

    async fn insert(&self, instance: &EventInstance) -> Result<(), RepoError> {
        match self.rows.entry(instance.id()) {
            Entry::Occupied(_) => Err(RepoError::constraint(format!(
                "event instance {} already exists",
                instance.id()
            ))),
            Entry::Vacant(slot) => {
                slot.insert(instance.clone());
                Ok(())
            }
        }
    }

    async fn compare_and_set(
        &self,
        instance: &EventInstance,
        expected_revision: u64,
    ) -> Result<bool, RepoError> {
        Ok(compare_and_set(
            &self.rows,
            instance.id(),
            instance,
            expected_revision,
        ))
    }

    async fn delete(&self, id: EventInstanceId) -> Result<bool, RepoError> {
        Ok(self.rows.remove(&id).is_some())
    }

    async fn list_by_state(&self, state: EventState) -> Result<Vec<EventInstance>, RepoError> {
        Ok(Self::sorted(collect_where(&self.rows, |i| {
            i.state() == state
        })))
    }

    async fn list_for_zone(&self, zone_id: ZoneId) -> Result<Vec<EventInstance>, RepoError> {
        Ok(Self::sorted(collect_where(&self.rows, |i| {
            i.zone_id() == zone_id
        })))
    }

    async fn list_finished_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<EventInstance>, RepoError> {
        Ok(Self::sorted(collect_where(&self.rows, |i| {
            i.state().is_terminal() && i.finished_at().is_some_and(|at| at < cutoff)
        })))
    }
}
