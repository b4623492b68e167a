//! Domain entities - time-gated content aggregates with identity

mod event_instance;
mod event_schedule;
mod lockout;
mod participation;
mod world_boss;

pub use event_instance::{EventInstance, EventState};
pub use event_schedule::{EventSchedule, ScheduleKey};
pub use lockout::{InstanceLockout, LockoutKey};
pub use participation::Participation;
pub use world_boss::{BossSpawnState, SpawnWindow, WorldBossSpawn};
