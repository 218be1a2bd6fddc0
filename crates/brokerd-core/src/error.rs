//! Error types for brokerd core helpers.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while parsing core values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid period: {0:?}")]
    InvalidPeriod(String),

    #[error("invalid task id: {0:?}")]
    InvalidTaskId(String),
}
