//! Domain errors for the folio engine.

use thiserror::Error;
use uuid::Uuid;

/// Coarse classification callers use to map errors onto their own surface
/// (HTTP status, CLI exit code).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidTransition,
    Forbidden,
    Validation,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::InvalidTransition => "invalid_transition",
            Self::Forbidden => "forbidden",
            Self::Validation => "validation",
            Self::Internal => "internal",
        }
    }
}

/// Domain-level errors that can occur in the folio engine.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Portfolio not found: {0}")]
    PortfolioNotFound(Uuid),

    #[error("Portfolio not found for slug: {0}")]
    SlugNotFound(String),

    #[error("Block {block_id} not found in portfolio {portfolio_id}")]
    BlockNotFound { portfolio_id: Uuid, block_id: String },

    #[error("Student not found: {0}")]
    StudentNotFound(Uuid),

    #[error("Block id already exists: {0}")]
    DuplicateBlockId(String),

    #[error("Slug already taken: {0}")]
    DuplicateSlug(String),

    #[error("Concurrency conflict: {entity} {id} was modified")]
    ConcurrencyConflict { entity: String, id: String },

    #[error("Verification already pending for block {0}")]
    AlreadyPending(String),

    #[error("Block {0} is already verified")]
    AlreadyVerified(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Portfolio {0} has an unreadable stored layout; repair it before editing")]
    UnreadableLayout(Uuid),
}

impl DomainError {
    /// Coarse category, used for CLI exit codes.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PortfolioNotFound(_)
            | Self::SlugNotFound(_)
            | Self::BlockNotFound { .. }
            | Self::StudentNotFound(_) => ErrorKind::NotFound,
            Self::DuplicateBlockId(_) | Self::DuplicateSlug(_) | Self::ConcurrencyConflict { .. } => {
                ErrorKind::Conflict
            }
            Self::AlreadyPending(_) | Self::AlreadyVerified(_) => ErrorKind::InvalidTransition,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::ValidationFailed(_) => ErrorKind::Validation,
            Self::DatabaseError(_) | Self::SerializationError(_) | Self::UnreadableLayout(_) => ErrorKind::Internal,
        }
    }

    pub fn block_not_found(portfolio_id: Uuid, block_id: impl Into<String>) -> Self {
        Self::BlockNotFound {
            portfolio_id,
            block_id: block_id.into(),
        }
    }
}

/// Result alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_cover_taxonomy() {
        assert_eq!(DomainError::PortfolioNotFound(Uuid::new_v4()).kind(), ErrorKind::NotFound);
        assert_eq!(DomainError::block_not_found(Uuid::new_v4(), "b1").kind(), ErrorKind::NotFound);
        assert_eq!(DomainError::DuplicateBlockId("b1".into()).kind(), ErrorKind::Conflict);
        assert_eq!(DomainError::DuplicateSlug("my-folio".into()).kind(), ErrorKind::Conflict);
        assert_eq!(DomainError::AlreadyPending("b1".into()).kind(), ErrorKind::InvalidTransition);
        assert_eq!(DomainError::AlreadyVerified("b1".into()).kind(), ErrorKind::InvalidTransition);
        assert_eq!(DomainError::Forbidden("locked".into()).kind(), ErrorKind::Forbidden);
        assert_eq!(DomainError::ValidationFailed("bad".into()).kind(), ErrorKind::Validation);
        assert_eq!(DomainError::UnreadableLayout(Uuid::new_v4()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_block_not_found_message() {
        let id = Uuid::new_v4();
        let err = DomainError::block_not_found(id, "block_x");
        assert_eq!(err.to_string(), format!("Block block_x not found in portfolio {id}"));
    }
}
