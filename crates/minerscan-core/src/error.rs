use thiserror::Error;

/// Errors raised while converting stored or user-supplied values into domain types.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid probe status: {0}")]
    InvalidStatus(String),

    #[error("Invalid run mode: {0}")]
    InvalidRunMode(String),
}
