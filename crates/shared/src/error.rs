//! Error types for the helpdesk engine

use thiserror::Error;

/// Failure taxonomy reported to callers unchanged
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeskError {
    /// A referenced ticket, message or user id does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The actor lacks the capability for the attempted mutation
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// Input violates an invariant
    #[error("Validation error: {0}")]
    Validation(String),

    /// Store, directory or assignment worker could not be reached
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl DeskError {
    pub fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{} {}", kind, id))
    }

    /// Only unavailability is transient; the rest are caller problems
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Result type alias for engine operations
pub type DeskResult<T> = Result<T, DeskError>;

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for DeskError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        match err {
            sqlx::Error::RowNotFound => DeskError::NotFound("row".to_string()),
            sqlx::Error::Database(db_err) => {
                if let Some(code) = db_err.code() {
                    // PostgreSQL unique violation
                    if code == "23505" {
                        return DeskError::Validation("Resource already exists".to_string());
                    }
                }
                DeskError::Unavailable(db_err.to_string())
            }
            _ => DeskError::Unavailable(err.to_string()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unavailable_is_retryable() {
        assert!(DeskError::Unavailable("store down".into()).is_retryable());
        assert!(!DeskError::NotFound("ticket".into()).is_retryable());
        assert!(!DeskError::Authorization("customer".into()).is_retryable());
        assert!(!DeskError::Validation("blank".into()).is_retryable());
    }

    #[test]
    fn test_not_found_message_names_the_entity() {
        let err = DeskError::not_found("ticket", 42);
        assert_eq!(err.to_string(), "Not found: ticket 42");
    }
}
