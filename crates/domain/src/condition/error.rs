use thiserror::Error;

use crate::common::entity::Mode;
use crate::common::error::DomainError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConditionError {
    #[error("condition index {index} out of range for set size {size}")]
    IndexOutOfRange { index: usize, size: usize },

    #[error("condition set for {mode} has inconsistent sizes {first} and {other}")]
    InconsistentSetSize {
        mode: Mode,
        first: usize,
        other: usize,
    },

    #[error("condition set for {mode} has duplicate index {index}")]
    DuplicateIndex { mode: Mode, index: usize },

    #[error("condition set for {mode} is missing index {index}")]
    MissingIndex { mode: Mode, index: usize },

    #[error("condition set size must be at least 1")]
    EmptySet,

    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("non-finite value for data id {data_id}")]
    NonFiniteValue { data_id: String },
}

impl From<ConditionError> for DomainError {
    fn from(e: ConditionError) -> Self {
        match e {
            ConditionError::NonFiniteValue { .. } => DomainError::EngineError(e.to_string()),
            other => DomainError::InvalidTrigger(other.to_string()),
        }
    }
}
