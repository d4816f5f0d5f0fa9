use thiserror::Error;

use super::entity::DampeningStrategy;
use crate::common::entity::Mode;
use crate::common::error::DomainError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DampeningError {
    #[error("invalid dampening setting {field}: {reason}")]
    InvalidSetting { field: &'static str, reason: String },

    #[error("strategy {strategy} is not allowed for mode {mode}")]
    ModeNotAllowed {
        strategy: DampeningStrategy,
        mode: Mode,
    },
}

impl From<DampeningError> for DomainError {
    fn from(e: DampeningError) -> Self {
        DomainError::InvalidTrigger(e.to_string())
    }
}
