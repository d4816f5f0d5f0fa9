pub mod memory_alert_store;
