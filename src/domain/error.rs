use thiserror::Error;

/// Malformed caller input for a decision request. Terminal for the cycle.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Invalid field `{field}`: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Errors a model adapter may return from `predict`. The fan-out guard turns
/// these into `AdapterFailure` values; they never leave a decision cycle.
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    #[error("Model unavailable: {0}")]
    Unavailable(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Error)]
pub enum DomainError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<rusqlite::Error> for DomainError {
    fn from(e: rusqlite::Error) -> Self {
        DomainError::Database(e.to_string())
    }
}
