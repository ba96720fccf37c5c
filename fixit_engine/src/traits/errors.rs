use thiserror::Error;

/// The error taxonomy shared by every marketplace operation.
///
/// Webhook reconciliation failures are not errors. They are reported as a
/// [`crate::market_api::ReconciliationFailure`] inside a normal result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarketError {
    #[error("Invalid request. {0}")]
    ValidationError(String),
    #[error("The requested record was not found. {0}")]
    NotFound(String),
    #[error("The request conflicts with an existing record. {0}")]
    Conflict(String),
    #[error("The request is not allowed in the current state. {0}")]
    BusinessRule(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for MarketError {
    fn from(e: sqlx::Error) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

impl MarketError {
    /// Maps a unique-constraint violation to [`MarketError::Conflict`] with the given message, and anything else to a
    /// database error.
    pub fn conflict_on_unique(e: sqlx::Error, message: impl Into<String>) -> Self {
        match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => Self::Conflict(message.into()),
            e => Self::from(e),
        }
    }
}

/// Raised by an external collaborator (chat service, real-time gateway, push provider).
#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    #[error("The collaborator could not be reached. {0}")]
    Unavailable(String),
    #[error("The collaborator rejected the request. {0}")]
    Rejected(String),
}

impl From<sqlx::Error> for CollaboratorError {
    fn from(e: sqlx::Error) -> Self {
        Self::Unavailable(e.to_string())
    }
}
