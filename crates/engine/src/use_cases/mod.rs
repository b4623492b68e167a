//! Use cases - orchestration across entity modules.
//!
//! - `ticker` drives time-based transitions (schedules, spawns, sweeps)
//! - `combat` routes combat-engine reports to participation, events and lockouts

pub mod combat;
pub mod ticker;

pub use combat::{CombatRouter, EventBossOutcome, MemberKill};
pub use ticker::{TickReport, Ticker, TriggerPolicy};
