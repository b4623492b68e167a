//! Infrastructure implementations.
//!
//! Port traits, the in-memory store, clocks, and settings/catalog loading.

pub mod catalog;
pub mod clock;
pub mod memory;
pub mod ports;
pub mod settings;
