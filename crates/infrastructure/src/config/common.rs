//! Shared parsing helpers and error types used across all config modules.

use std::path::Path;

use tracing::warn;

use domain::alert::entity::AlertStatus;
use domain::common::entity::{Mode, Severity};
use domain::common::pattern::{REGEX_NEST_LIMIT, REGEX_SIZE_LIMIT};
use domain::condition::entity::{
    AvailabilityOperator, CompareOperator, RangeBound, RateDirection, RatePeriod, StringOperator,
};
use domain::dampening::entity::DampeningStrategy;

// ── Security limits ────────────────────────────────────────────────
//
// Maximum counts per section to prevent OOM from excessive config.

/// Maximum triggers across all tenants.
pub(super) const MAX_TRIGGERS: usize = 10_000;
/// Maximum conditions per trigger (both modes).
pub(super) const MAX_CONDITIONS_PER_TRIGGER: usize = 64;
/// Maximum action bindings per trigger.
pub(super) const MAX_BINDINGS_PER_TRIGGER: usize = 32;
/// Maximum configured actions.
pub(super) const MAX_ACTIONS: usize = 10_000;
/// Maximum action plugins.
pub(super) const MAX_PLUGINS: usize = 100;
/// Maximum entries in the delivery backoff schedule.
pub(super) const MAX_BACKOFF_STEPS: usize = 16;

// ── Config errors ──────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(String),

    #[error("validation error: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("invalid value '{value}' for field '{field}': expected one of {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },
}

impl From<serde_yaml_ng::Error> for ConfigError {
    fn from(e: serde_yaml_ng::Error) -> Self {
        Self::Yaml(e.to_string())
    }
}

// ── Shared serde defaults ──────────────────────────────────────────

pub(super) fn default_true() -> bool {
    true
}

pub(super) fn default_mode() -> String {
    "firing".to_string()
}

// ── Validation helpers ─────────────────────────────────────────────

/// Log a warning if a file is world-readable (Unix only).
///
/// Plugin properties may carry credentials (SMTP passwords, webhook tokens).
#[cfg(unix)]
pub(super) fn warn_if_world_readable(path: &Path, label: &str) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(metadata) = std::fs::metadata(path) {
        let mode = metadata.permissions().mode();
        if mode & 0o004 != 0 {
            warn!(
                path = %path.display(),
                mode = format!("{mode:04o}"),
                "{label} is world-readable, consider chmod 640 or stricter",
            );
        }
    }
}

#[cfg(not(unix))]
pub(super) fn warn_if_world_readable(_path: &Path, _label: &str) {}

/// Enforce a maximum count on a config collection.
pub(super) fn check_limit(field: &str, count: usize, max: usize) -> Result<(), ConfigError> {
    if count > max {
        return Err(ConfigError::Validation {
            field: field.to_string(),
            message: format!("count {count} exceeds maximum {max}"),
        });
    }
    Ok(())
}

pub(super) fn require_non_empty(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: field.to_string(),
            message: "must not be empty".to_string(),
        });
    }
    Ok(())
}

/// Validate a regex pattern with size and nesting limits.
pub(super) fn validate_regex(pattern: &str, field: &str) -> Result<(), ConfigError> {
    regex::RegexBuilder::new(pattern)
        .size_limit(REGEX_SIZE_LIMIT)
        .nest_limit(REGEX_NEST_LIMIT)
        .build()
        .map_err(|e| ConfigError::Validation {
            field: field.to_string(),
            message: format!("invalid regex: {e}"),
        })?;
    Ok(())
}

/// Turn a `parse_*` failure into an `InvalidValue` error for `field`.
pub(super) fn invalid(field: &str, value: &str, expected: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        expected: expected.to_string(),
    }
}

// ── Parsing helpers ────────────────────────────────────────────────
//
// Config values are case-insensitive; `-` and `_` are interchangeable.

fn normalize(s: &str) -> String {
    s.trim().to_lowercase().replace('-', "_")
}

pub(super) fn parse_severity(s: &str) -> Result<Severity, ()> {
    match normalize(s).as_str() {
        "low" | "info" => Ok(Severity::Low),
        "medium" | "warning" => Ok(Severity::Medium),
        "high" => Ok(Severity::High),
        "critical" | "crit" => Ok(Severity::Critical),
        _ => Err(()),
    }
}

pub(super) fn parse_mode(s: &str) -> Result<Mode, ()> {
    match normalize(s).as_str() {
        "firing" | "fire" => Ok(Mode::Firing),
        "autoresolve" | "auto_resolve" => Ok(Mode::Autoresolve),
        _ => Err(()),
    }
}

pub(super) fn parse_alert_status(s: &str) -> Result<AlertStatus, ()> {
    match normalize(s).as_str() {
        "open" => Ok(AlertStatus::Open),
        "acknowledged" | "ack" => Ok(AlertStatus::Acknowledged),
        "resolved" => Ok(AlertStatus::Resolved),
        _ => Err(()),
    }
}

pub(super) fn parse_compare_operator(s: &str) -> Result<CompareOperator, ()> {
    match normalize(s).as_str() {
        "lt" | "<" => Ok(CompareOperator::Lt),
        "lte" | "<=" => Ok(CompareOperator::Lte),
        "gt" | ">" => Ok(CompareOperator::Gt),
        "gte" | ">=" => Ok(CompareOperator::Gte),
        "eq" | "==" => Ok(CompareOperator::Eq),
        "ne" | "!=" => Ok(CompareOperator::Ne),
        _ => Err(()),
    }
}

pub(super) fn parse_availability_operator(s: &str) -> Result<AvailabilityOperator, ()> {
    match normalize(s).as_str() {
        "down" => Ok(AvailabilityOperator::Down),
        "not_up" => Ok(AvailabilityOperator::NotUp),
        "up" => Ok(AvailabilityOperator::Up),
        _ => Err(()),
    }
}

pub(super) fn parse_range_bound(s: &str) -> Result<RangeBound, ()> {
    match normalize(s).as_str() {
        "inclusive" => Ok(RangeBound::Inclusive),
        "exclusive" => Ok(RangeBound::Exclusive),
        _ => Err(()),
    }
}

pub(super) fn parse_string_operator(s: &str) -> Result<StringOperator, ()> {
    match normalize(s).as_str() {
        "equal" | "equals" => Ok(StringOperator::Equal),
        "not_equal" => Ok(StringOperator::NotEqual),
        "starts_with" => Ok(StringOperator::StartsWith),
        "ends_with" => Ok(StringOperator::EndsWith),
        "contains" => Ok(StringOperator::Contains),
        "match" | "matches" => Ok(StringOperator::Match),
        _ => Err(()),
    }
}

pub(super) fn parse_rate_direction(s: &str) -> Result<RateDirection, ()> {
    match normalize(s).as_str() {
        "increasing" => Ok(RateDirection::Increasing),
        "decreasing" => Ok(RateDirection::Decreasing),
        "na" | "any" => Ok(RateDirection::Na),
        _ => Err(()),
    }
}

pub(super) fn parse_rate_period(s: &str) -> Result<RatePeriod, ()> {
    match normalize(s).as_str() {
        "second" => Ok(RatePeriod::Second),
        "minute" => Ok(RatePeriod::Minute),
        "hour" => Ok(RatePeriod::Hour),
        "day" => Ok(RatePeriod::Day),
        _ => Err(()),
    }
}

pub(super) fn parse_dampening_strategy(s: &str) -> Result<DampeningStrategy, ()> {
    match normalize(s).as_str() {
        "strict" => Ok(DampeningStrategy::Strict),
        "strict_time" => Ok(DampeningStrategy::StrictTime),
        "strict_time_autoresolve" => Ok(DampeningStrategy::StrictTimeAutoresolve),
        "relaxed_count" => Ok(DampeningStrategy::RelaxedCount),
        "relaxed_time" => Ok(DampeningStrategy::RelaxedTime),
        _ => Err(()),
    }
}
