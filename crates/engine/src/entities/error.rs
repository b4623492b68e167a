//! Error type shared by the content entity modules.

use timegate_domain::DomainError;

use crate::infrastructure::ports::RepoError;

/// Attempts per read-modify-write before giving up with `Conflict`.
pub const MAX_UPDATE_ATTEMPTS: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
    #[error("Concurrent update conflict on {entity_type} {id} after {attempts} attempts")]
    Conflict {
        entity_type: &'static str,
        id: String,
        attempts: usize,
    },
}

impl ContentError {
    pub fn conflict(entity_type: &'static str, id: impl ToString) -> Self {
        Self::Conflict {
            entity_type,
            id: id.to_string(),
            attempts: MAX_UPDATE_ATTEMPTS,
        }
    }

    /// True when the request itself was rejected (bad input or state),
    /// false for infrastructure trouble the caller may retry.
    pub fn is_domain(&self) -> bool {
        matches!(self, Self::Domain(_))
    }

    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            Self::Domain(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Domain(e) => matches!(e, DomainError::NotFound { .. }),
            Self::Repo(e) => e.is_not_found(),
            Self::Conflict { .. } => false,
        }
    }
}
