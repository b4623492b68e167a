//! Application state and composition.

use std::sync::Arc;

use crate::entities::{
    EventInstanceManager, EventScheduler, LockoutEngine, ParticipationTracker,
    WorldBossSpawnController,
};
use crate::infrastructure::{
    catalog::ContentCatalog,
    clock::{SystemClock, SystemRandom},
    memory::MemoryRepositories,
    ports::{
        ClockPort, EventInstanceRepo, EventScheduleRepo, LockoutRepo, ParticipationRepo,
        RandomPort, WorldBossRepo,
    },
    settings::ContentSettings,
};
use crate::use_cases::{CombatRouter, Ticker, TriggerPolicy};

/// Main application state.
///
/// Holds the repositories, the content components and the use cases built
/// on top of them.
pub struct App {
    pub repositories: Repositories,
    pub content: Content,
    pub use_cases: UseCases,
    pub settings: ContentSettings,
    pub catalog: Arc<ContentCatalog>,
}

/// Port traits injected directly.
pub struct Repositories {
    pub event_instance: Arc<dyn EventInstanceRepo>,
    pub participation: Arc<dyn ParticipationRepo>,
    pub schedule: Arc<dyn EventScheduleRepo>,
    pub world_boss: Arc<dyn WorldBossRepo>,
    pub lockout: Arc<dyn LockoutRepo>,
}

impl From<MemoryRepositories> for Repositories {
    fn from(repos: MemoryRepositories) -> Self {
        Self {
            event_instance: repos.event_instance,
            participation: repos.participation,
            schedule: repos.schedule,
            world_boss: repos.world_boss,
            lockout: repos.lockout,
        }
    }
}

/// Content components over the shared store.
pub struct Content {
    pub scheduler: Arc<EventScheduler>,
    pub world_bosses: Arc<WorldBossSpawnController>,
    pub lockouts: Arc<LockoutEngine>,
    pub events: Arc<EventInstanceManager>,
    pub participation: Arc<ParticipationTracker>,
}

pub struct UseCases {
    pub ticker: Arc<Ticker>,
    pub combat: Arc<CombatRouter>,
}

impl App {
    /// Wire everything over the system clock and randomness.
    pub fn new(repos: Repositories, settings: ContentSettings, catalog: ContentCatalog) -> Self {
        Self::with_ports(
            repos,
            settings,
            catalog,
            Arc::new(SystemClock::new()),
            Arc::new(SystemRandom::new()),
        )
    }

    /// In-memory store, used by the runner.
    pub fn in_memory(settings: ContentSettings, catalog: ContentCatalog) -> Self {
        Self::new(MemoryRepositories::new().into(), settings, catalog)
    }

    pub fn with_ports(
        repos: Repositories,
        settings: ContentSettings,
        catalog: ContentCatalog,
        clock: Arc<dyn ClockPort>,
        random: Arc<dyn RandomPort>,
    ) -> Self {
        let catalog = Arc::new(catalog);

        let scheduler = Arc::new(EventScheduler::new(
            repos.schedule.clone(),
            clock.clone(),
            settings.scheduler.unarmed,
        ));
        let world_bosses = Arc::new(WorldBossSpawnController::new(
            repos.world_boss.clone(),
            clock.clone(),
            settings.default_boss_window(),
        ));
        let lockouts = Arc::new(LockoutEngine::new(
            repos.lockout.clone(),
            clock.clone(),
            settings.reset,
            settings.lockouts.clone(),
        ));
        let events = Arc::new(EventInstanceManager::new(
            repos.event_instance.clone(),
            repos.participation.clone(),
            clock.clone(),
        ));
        let participation = Arc::new(ParticipationTracker::new(
            repos.participation.clone(),
            clock.clone(),
            settings.contribution,
        ));

        let ticker = Arc::new(Ticker::new(
            scheduler.clone(),
            events.clone(),
            world_bosses.clone(),
            lockouts.clone(),
            catalog.clone(),
            TriggerPolicy::new(random),
            clock,
            settings.terminal_ttl(),
        ));
        let combat = Arc::new(CombatRouter::new(
            events.clone(),
            participation.clone(),
            lockouts.clone(),
            catalog.clone(),
        ));

        Self {
            repositories: repos,
            content: Content {
                scheduler,
                world_bosses,
                lockouts,
                events,
                participation,
            },
            use_cases: UseCases { ticker, combat },
            settings,
            catalog,
        }
    }
}
