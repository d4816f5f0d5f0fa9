use thiserror::Error;

use crate::common::error::DomainError;

/// Why an event expression cannot match anything.
///
/// Only surfaced by validation; runtime matching turns every one of these
/// into a `false` result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    #[error("expression is empty")]
    Empty,

    #[error("clause {index} '{clause}': expected 3 tokens, found {found}")]
    TokenCount {
        index: usize,
        clause: String,
        found: usize,
    },

    #[error("clause {index}: unknown field '{field}'")]
    UnknownField { index: usize, field: String },

    #[error("clause {index}: unknown operator '{operator}'")]
    UnknownOperator { index: usize, operator: String },

    #[error("clause {index}: unmatched quote in constant {constant}")]
    UnmatchedQuote { index: usize, constant: String },

    #[error("clause {index}: constant {constant} is neither quoted nor numeric")]
    InvalidNumber { index: usize, constant: String },

    #[error("clause {index}: invalid regex '{pattern}': {reason}")]
    InvalidRegex {
        index: usize,
        pattern: String,
        reason: String,
    },

    #[error("clause {index}: {reason}")]
    TypeMismatch { index: usize, reason: String },
}

impl From<ExpressionError> for DomainError {
    fn from(e: ExpressionError) -> Self {
        DomainError::InvalidTrigger(e.to_string())
    }
}
