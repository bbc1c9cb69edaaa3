use thiserror::Error;

/// Errors surfaced by the task, category and template stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Storage backend unavailable: {0}")]
    CollaboratorUnavailable(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        StoreError::NotFound { entity, id }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        StoreError::ValidationFailed(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::CollaboratorUnavailable(_))
    }
}

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown priority '{0}' (expected high, medium or low)")]
pub struct ParsePriorityError(pub String);
