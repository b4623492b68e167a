//! Engine E2E tests.
//!
//! Full `App` flows against the in-memory store, with a manual clock so
//! resets, cooldowns and TTLs can be crossed deterministically.
//!
//! ```bash
//! cargo test -p timegate-engine --lib e2e_tests
//! ```

mod e2e_helpers;
mod world_boss_flow_tests;
