use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A single contribution reported by the combat engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contribution {
    Kill,
    Damage(u64),
    Healing(u64),
    Objective(u32),
}

/// How many contribution points each kind of action is worth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContributionRules {
    pub points_per_kill: u64,
    /// Damage needed for one point
    pub damage_per_point: u64,
    /// Healing needed for one point
    pub healing_per_point: u64,
    pub points_per_objective: u64,
}

impl Default for ContributionRules {
    fn default() -> Self {
        Self {
            points_per_kill: 10,
            damage_per_point: 100,
            healing_per_point: 100,
            points_per_objective: 50,
        }
    }
}

impl ContributionRules {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.damage_per_point == 0 || self.healing_per_point == 0 {
            return Err(DomainError::configuration(
                "damage and healing per point must be positive",
            ));
        }
        Ok(())
    }

    /// Points a contribution is worth. Remainders are dropped per report.
    pub fn points(&self, contribution: Contribution) -> u64 {
        match contribution {
            Contribution::Kill => self.points_per_kill,
            Contribution::Damage(amount) => amount / self.damage_per_point.max(1),
            Contribution::Healing(amount) => amount / self.healing_per_point.max(1),
            Contribution::Objective(_) => self.points_per_objective,
        }
    }
}
