//! EventSchedule entity - when a recurring event definition fires in a zone
//!
//! The schedule records timestamps and a trigger configuration. It never
//! derives the next trigger time itself; whoever marks it triggered passes
//! the next time in.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::ids::{EventDefId, ZoneId};
use crate::value_objects::{TriggerConfig, TriggerType, UnarmedSchedulePolicy};

/// One schedule per event definition per zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleKey {
    pub event_def_id: EventDefId,
    pub zone_id: ZoneId,
}

impl ScheduleKey {
    pub fn new(event_def_id: EventDefId, zone_id: ZoneId) -> Self {
        Self {
            event_def_id,
            zone_id,
        }
    }
}

impl fmt::Display for ScheduleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.event_def_id, self.zone_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSchedule {
    key: ScheduleKey,
    trigger: TriggerConfig,
    enabled: bool,
    last_triggered_at: Option<DateTime<Utc>>,
    /// `None` means "not yet computed", which is not the same as "due now"
    next_trigger_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    revision: u64,
}

impl EventSchedule {
    /// Create an enabled, unarmed schedule. The trigger config is validated.
    pub fn new(
        key: ScheduleKey,
        trigger: TriggerConfig,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        trigger.validate()?;
        Ok(Self {
            key,
            trigger,
            enabled: true,
            last_triggered_at: None,
            next_trigger_at: None,
            created_at: now,
            revision: 0,
        })
    }

    // Read accessors
    pub fn key(&self) -> ScheduleKey {
        self.key
    }

    pub fn event_def_id(&self) -> EventDefId {
        self.key.event_def_id
    }

    pub fn zone_id(&self) -> ZoneId {
        self.key.zone_id
    }

    pub fn trigger(&self) -> &TriggerConfig {
        &self.trigger
    }

    pub fn trigger_type(&self) -> TriggerType {
        self.trigger.trigger_type()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn last_triggered_at(&self) -> Option<DateTime<Utc>> {
        self.last_triggered_at
    }

    pub fn next_trigger_at(&self) -> Option<DateTime<Utc>> {
        self.next_trigger_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_armed(&self) -> bool {
        self.next_trigger_at.is_some()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Set the concurrency token (for repository adapters).
    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }

    pub fn is_due(&self, now: DateTime<Utc>, unarmed: UnarmedSchedulePolicy) -> bool {
        if !self.enabled {
            return false;
        }
        match self.next_trigger_at {
            Some(at) => at <= now,
            None => unarmed == UnarmedSchedulePolicy::FireImmediately,
        }
    }

    /// Set the first trigger time explicitly.
    pub fn arm(&mut self, at: DateTime<Utc>) {
        self.next_trigger_at = Some(at);
    }

    pub fn mark_triggered(
        &mut self,
        now: DateTime<Utc>,
        next_trigger_at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.enabled {
            return Err(DomainError::invalid_state_transition(format!(
                "schedule {} is disabled",
                self.key
            )));
        }
        if next_trigger_at <= now {
            return Err(DomainError::validation(format!(
                "next trigger for {} must be after the current trigger",
                self.key
            )));
        }
        self.last_triggered_at = Some(now);
        self.next_trigger_at = Some(next_trigger_at);
        Ok(())
    }

    /// Enable without touching timers.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Disable without touching timers.
    pub fn disable(&mut self) {
        self.enabled = false;
    }
}
