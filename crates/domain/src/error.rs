//! Unified error types for the domain layer
//!
//! Every domain failure is returned as a value. Callers can always tell a
//! no-op ("already done") from a rejected request, and none of these are
//! fatal to the server process.

use thiserror::Error;

/// Unified error type for domain operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Entity not found
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// State transition not allowed; the entity is left untouched
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// Create was requested for an entity that already exists
    #[error("Already exists: {entity_type} with id {id}")]
    AlreadyExists {
        entity_type: &'static str,
        id: String,
    },

    /// Explicit join for a character that already participates
    #[error("Character {character_id} already joined event {event_instance_id}")]
    AlreadyJoined {
        event_instance_id: String,
        character_id: String,
    },

    /// Rewards were already claimed for this participation
    #[error("Rewards already claimed by {character_id} for event {event_instance_id}")]
    AlreadyClaimed {
        event_instance_id: String,
        character_id: String,
    },

    /// Malformed or missing trigger/lockout configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Validation failed (e.g., invalid field values)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Business rule violation
    #[error("Constraint violation: {0}")]
    Constraint(String),
}

impl DomainError {
    /// Create a not found error
    pub fn not_found(entity_type: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type,
            id: id.to_string(),
        }
    }

    /// Create an invalid state transition error
    pub fn invalid_state_transition(msg: impl Into<String>) -> Self {
        Self::InvalidStateTransition(msg.into())
    }

    /// Create an already-exists error
    pub fn already_exists(entity_type: &'static str, id: impl ToString) -> Self {
        Self::AlreadyExists {
            entity_type,
            id: id.to_string(),
        }
    }

    pub fn already_joined(event_instance_id: impl ToString, character_id: impl ToString) -> Self {
        Self::AlreadyJoined {
            event_instance_id: event_instance_id.to_string(),
            character_id: character_id.to_string(),
        }
    }

    pub fn already_claimed(event_instance_id: impl ToString, character_id: impl ToString) -> Self {
        Self::AlreadyClaimed {
            event_instance_id: event_instance_id.to_string(),
            character_id: character_id.to_string(),
        }
    }

    /// Creates a configuration error.
    ///
    /// Use this when trigger or lockout configuration is malformed or
    /// missing. Configuration is never silently defaulted; the only
    /// documented fallback is the daily reset for unrecognized instance
    /// types, which is reported through `ExpiryRule` instead.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a validation error for field-level input problems.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a constraint violation error
    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::Constraint(msg.into())
    }

    /// True for idempotency guards: the requested work was already done.
    pub fn is_already_done(&self) -> bool {
        matches!(
            self,
            Self::AlreadyExists { .. } | Self::AlreadyJoined { .. } | Self::AlreadyClaimed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let err = DomainError::not_found("EventInstance", "123e4567-e89b-12d3-a456-426614174000");
        assert!(matches!(err, DomainError::NotFound { .. }));
        assert!(err.to_string().contains("EventInstance"));
        assert!(err.to_string().contains("123e4567"));
    }

    #[test]
    fn test_invalid_state_transition_error() {
        let err = DomainError::invalid_state_transition("cannot start from complete");
        assert_eq!(
            err.to_string(),
            "Invalid state transition: cannot start from complete"
        );
    }

    #[test]
    fn test_idempotency_guards_are_already_done() {
        assert!(DomainError::already_joined("e", "c").is_already_done());
        assert!(DomainError::already_claimed("e", "c").is_already_done());
        assert!(DomainError::already_exists("EventSchedule", "7:3").is_already_done());
        assert!(!DomainError::configuration("bad trigger").is_already_done());
    }

    #[test]
    fn test_configuration_error_message() {
        let err = DomainError::configuration("interval must be positive");
        assert_eq!(
            err.to_string(),
            "Configuration error: interval must be positive"
        );
    }
}
