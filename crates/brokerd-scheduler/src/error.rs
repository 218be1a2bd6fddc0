//! Scheduler error types.

use brokerd_core::CoreError;
use thiserror::Error;

/// Errors that can occur while loading brokers or handling scheduler events.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("invalid broker id {0:?}: must be non-empty and contain no '-'")]
    InvalidBrokerId(String),

    #[error("broker not found: {0}")]
    BrokerNotFound(String),

    #[error("broker already exists: {0}")]
    DuplicateBroker(String),

    #[error("broker {0} must be stopped first")]
    BrokerActive(String),

    #[error("broker {0} already has a task")]
    TaskAlreadyAssigned(String),

    #[error("invalid broker id expression: {0:?}")]
    InvalidIdExpression(String),
}

impl SchedulerError {
    pub(crate) fn invalid_field(field: impl Into<String>, reason: impl ToString) -> Self {
        SchedulerError::InvalidField {
            field: field.into(),
            reason: reason.to_string(),
        }
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
