pub mod file_listener;
pub mod log_listener;
