//! Entity modules - Domain capability encapsulation.
//!
//! Each module wraps operations for one content aggregate. They depend on
//! repository ports and provide the building blocks for use cases.

pub mod error;
pub mod event_instance;
pub mod event_scheduler;
pub mod lockout;
pub mod participation;
pub mod world_boss;

pub use error::{ContentError, MAX_UPDATE_ATTEMPTS};
pub use event_instance::EventInstanceManager;
pub use event_scheduler::EventScheduler;
pub use lockout::LockoutEngine;
pub use participation::{ContributionOutcome, ParticipationTracker};
pub use world_boss::WorldBossSpawnController;
