use thiserror::Error;

use crate::common::entity::Mode;
use crate::common::error::DomainError;
use crate::condition::error::ConditionError;
use crate::dampening::error::DampeningError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TriggerError {
    #[error("invalid trigger: {0}")]
    InvalidDefinition(String),

    #[error("trigger has no FIRING conditions")]
    NoFiringConditions,

    #[error("condition {condition_id} does not belong to trigger: {reason}")]
    ForeignCondition {
        condition_id: String,
        reason: String,
    },

    #[error("more than one dampening for mode {0}")]
    DuplicateDampening(Mode),

    #[error("dampening for mode {0} has no conditions")]
    DampeningWithoutConditions(Mode),

    #[error("condition error: {0}")]
    Condition(#[from] ConditionError),

    #[error("dampening error: {0}")]
    Dampening(#[from] DampeningError),
}

impl From<TriggerError> for DomainError {
    fn from(e: TriggerError) -> Self {
        match e {
            TriggerError::Condition(inner) => inner.into(),
            TriggerError::Dampening(inner) => inner.into(),
            other => DomainError::InvalidTrigger(other.to_string()),
        }
    }
}
