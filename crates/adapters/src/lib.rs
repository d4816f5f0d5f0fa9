#![deny(unsafe_code)]

pub mod action;
pub mod definitions;
pub mod fact_source;
pub mod storage;
