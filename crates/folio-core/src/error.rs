//! Domain-level error types.

use thiserror::Error;
use uuid::Uuid;

/// Domain errors - revision graph and validation failures.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The revision graph was used in a way that could lose edits,
    /// e.g. applying a record that has no original.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: &'static str, id: Uuid },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] RepoError),
}

impl DomainError {
    pub fn post_not_found(id: impl Into<Uuid>) -> Self {
        Self::NotFound {
            entity_type: "post",
            id: id.into(),
        }
    }
}

/// Repository-level errors.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Database connection failed: {0}")]
    Connection(String),

    #[error("Query execution failed: {0}")]
    Query(String),

    #[error("Entity not found")]
    NotFound,

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),
}
