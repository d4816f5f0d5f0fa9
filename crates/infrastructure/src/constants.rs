use std::time::Duration;

pub const SERVICE_NAME: &str = "alertforge-agent";

pub const DEFAULT_CONFIG_PATH: &str = "/etc/alertforge/config.yaml";

// ── Channel capacities ─────────────────────────────────────────────

/// Fact batches (ticks) buffered between the source and the engine.
pub const FACT_CHANNEL_CAPACITY: usize = 1_024;
/// Engine commands buffered between ticks.
pub const COMMAND_CHANNEL_CAPACITY: usize = 64;

// ── Timeouts ───────────────────────────────────────────────────────

pub const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
