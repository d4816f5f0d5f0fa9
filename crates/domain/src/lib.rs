#![forbid(unsafe_code)]

pub mod action;
pub mod alert;
pub mod common;
pub mod condition;
pub mod correlation;
pub mod dampening;
pub mod expression;
pub mod fact;
pub mod trigger;
