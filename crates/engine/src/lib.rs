//! Timegate Engine library.
//!
//! Time-gated game content: scheduled public events, world boss spawns,
//! instance lockouts and event participation.
//!
//! ## Structure
//!
//! - `entities/` - Content components wrapping domain operations
//! - `use_cases/` - Ticker and combat routing across components
//! - `infrastructure/` - Ports, the in-memory store, settings and catalog
//! - `app` - Application composition

pub mod app;
pub mod entities;
pub mod infrastructure;
pub mod use_cases;

/// End-to-end flows against the in-memory store.
#[cfg(test)]
mod e2e_tests;

pub use app::App;
