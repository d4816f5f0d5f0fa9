pub mod action_listener;
pub mod alert_store;
pub mod definitions_service;
pub mod metrics_port;
