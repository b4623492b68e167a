//! In-memory participation storage.

use async_trait::async_trait;
use dashmap::DashMap;
use timegate_domain::{CharacterId, EventInstanceId, Participation};

use super::{collect_where, compare_and_set, insert_if_absent};
use crate::infrastructure::ports::{ParticipationRepo, RepoError};

type ParticipationKey = (EventInstanceId, CharacterId);

pub struct MemoryParticipationRepo {
    rows: DashMap<ParticipationKey, Participation>,
}

impl MemoryParticipationRepo {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }

    fn key(participation: &Participation) -> ParticipationKey {
        (participation.event_instance_id(), participation.character_id())
    }
}

impl Default for MemoryParticipationRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ParticipationRepo for MemoryParticipationRepo {
    async fn get(
        &self,
        event_instance_id: EventInstanceId,
        character_id: CharacterId,
    ) -> Result<Option<Participation>, RepoError> {
        Ok(self
            .rows
            .get(&(event_instance_id, character_id))
            .map(|row| row.value().clone()))
    }

    async fn insert_if_absent(
        &self,
        participation: &Participation,
    ) -> Result<(Participation, bool), RepoError> {
        Ok(insert_if_absent(
            &self.rows,
            Self::key(participation),
            participation,
        ))
    }

    async fn compare_and_set(
        &self,
        participation: &Participation,
        expected_revision: u64,
    ) -> Result<bool, RepoError> {
        Ok(compare_and_set(
            &self.rows,
            Self::key(participation),
            participation,
            expected_revision,
        ))
    }

    async fn list_for_event(
        &self,
        event_instance_id: EventInstanceId,
    ) -> Result<Vec<Participation>, RepoError> {
        let mut rows = collect_where(&self.rows, |p| p.event_instance_id() == event_instance_id);
        rows.sort_by(|a, b| {
            a.joined_at()
                .cmp(&b.joined_at())
                .then_with(|| a.character_id().cmp(&b.character_id()))
        });
        Ok(rows)
    }

    async fn count_for_event(&self, event_instance_id: EventInstanceId) -> Result<u32, RepoError> {
        let count = self
            .rows
            .iter()
            .filter(|row| row.key().0 == event_instance_id)
            .count();
        u32::try_from(count).map_err(|e| RepoError::database("count_for_event", e))
    }
}
