use thiserror::Error;

use super::entity::AlertStatus;
use crate::common::error::DomainError;

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("alert {alert_id} cannot be {operation} from status {status}")]
    InvalidTransition {
        alert_id: String,
        status: AlertStatus,
        operation: &'static str,
    },

    #[error("alert store write failed: {0}")]
    StoreFailed(String),

    #[error("alert store query failed: {0}")]
    QueryFailed(String),

    #[error("alert store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("alert not found: {0}")]
    NotFound(String),
}

impl AlertError {
    /// Rejected lifecycle transitions leave the alert untouched and are
    /// reported, never fatal.
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Self::InvalidTransition { .. })
    }
}

impl From<AlertError> for DomainError {
    fn from(e: AlertError) -> Self {
        DomainError::EngineError(e.to_string())
    }
}
