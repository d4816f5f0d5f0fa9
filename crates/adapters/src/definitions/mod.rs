pub mod memory_definitions;
