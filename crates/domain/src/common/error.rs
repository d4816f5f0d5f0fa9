use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("trigger not found: {0}")]
    TriggerNotFound(String),

    #[error("duplicate trigger: {0}")]
    DuplicateTrigger(String),

    #[error("invalid trigger: {0}")]
    InvalidTrigger(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("engine error: {0}")]
    EngineError(String),
}
