use thiserror::Error;

/// Business-rule failures raised by the service layer
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Requested quantity ({requested}) exceeds available stock ({available}).")]
    InsufficientStock { requested: i32, available: i32 },

    #[error("Cannot move from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for DomainError {
    fn from(err: rusqlite::Error) -> Self {
        DomainError::Internal(err.into())
    }
}

impl From<r2d2::Error> for DomainError {
    fn from(err: r2d2::Error) -> Self {
        DomainError::Internal(err.into())
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

/// Shorthand for validation failures
pub fn invalid<T>(msg: impl Into<String>) -> DomainResult<T> {
    Err(DomainError::Validation(msg.into()))
}
