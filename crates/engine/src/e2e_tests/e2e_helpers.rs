//! E2E test helpers for constructing the full application stack.
//!
//! Builds an [`App`] over the in-memory store with a hand-driven clock and
//! a seeded content catalog.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use timegate_domain::{BossId, EventDefId, InstanceDefId, ZoneId};

use crate::app::App;
use crate::infrastructure::catalog::ContentCatalog;
use crate::infrastructure::clock::{FixedRandom, ManualClock};
use crate::infrastructure::memory::MemoryRepositories;
use crate::infrastructure::settings::ContentSettings;

pub const INCURSION: EventDefId = EventDefId::new(1);
pub const FESTIVAL: EventDefId = EventDefId::new(2);
pub const SUNKEN_VAULT: InstanceDefId = InstanceDefId::new(100);
pub const CRYPT_OF_ASH: InstanceDefId = InstanceDefId::new(200);
pub const IRON_WARPLOT: InstanceDefId = InstanceDefId::new(300);
pub const HIGHLANDS: ZoneId = ZoneId::new(12);
pub const STORM_TITAN: BossId = BossId::new(7);
pub const VAULT_WARDEN: BossId = BossId::new(101);

/// Seeded content. The warplot's type is deliberately unknown.
pub const CATALOG_JSON: &str = r#"{
    "events": [
        { "id": 1, "name": "Shadow Incursion", "durationMinutes": 20 },
        { "id": 2, "name": "Harvest Festival", "durationMinutes": 45, "initialPhase": 1 }
    ],
    "instances": [
        { "id": 100, "name": "Sunken Vault", "type": "raid" },
        { "id": 200, "name": "Crypt of Ash", "type": "dungeon" },
        { "id": 300, "name": "Iron Warplot", "type": "warplot" }
    ]
}"#;

/// Wednesday 2024-05-01 18:00 UTC, the day after a weekly reset.
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0)
        .single()
        .expect("valid test timestamp")
}

pub struct TestWorld {
    pub app: App,
    pub clock: Arc<ManualClock>,
}

impl TestWorld {
    pub fn new() -> Self {
        Self::with_settings(ContentSettings::default())
    }

    pub fn with_settings(settings: ContentSettings) -> Self {
        let clock = Arc::new(ManualClock::new(start_time()));
        let catalog = ContentCatalog::from_json_str(CATALOG_JSON).expect("seed catalog");
        let app = App::with_ports(
            MemoryRepositories::new().into(),
            settings,
            catalog,
            clock.clone(),
            // Random windows always draw their lower bound
            Arc::new(FixedRandom(0)),
        );
        Self { app, clock }
    }

    pub fn advance(&self, by: chrono::Duration) {
        self.clock.advance(by);
    }

    pub fn now(&self) -> DateTime<Utc> {
        use crate::infrastructure::ports::ClockPort;
        self.clock.now()
    }
}
