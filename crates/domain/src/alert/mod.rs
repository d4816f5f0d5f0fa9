pub mod entity;
pub mod error;
pub mod lifecycle;
pub mod query;
