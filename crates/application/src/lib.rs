#![forbid(unsafe_code)]

pub mod action_dispatcher;
pub mod alert_engine;
pub mod retry;
