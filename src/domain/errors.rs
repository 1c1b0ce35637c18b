use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Access denied: {0}")]
    Forbidden(String),
    #[error("Illegal status transition from '{from}' to '{to}'")]
    InvalidTransition { from: String, to: String },
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal error: {0}")]
    Internal(String),
}
