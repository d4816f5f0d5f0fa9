//! Agent configuration: structs, parsing, and validation.
//!
//! The config module is split across several sub-modules:
//! - `common`: shared helpers and `ConfigError`
//! - `trigger`: triggers, conditions, dampening
//! - `action`: plugins, action definitions, dispatch tuning

mod action;
mod common;
mod trigger;

pub use action::{ActionConfig, DispatchConfig, ListenerKind, PluginConfig, WILDCARD_PLUGIN};
pub use common::ConfigError;
pub use trigger::{ActionBindingConfig, ConditionConfig, DampeningConfig, TriggerConfig};

use std::collections::HashSet;
use std::path::Path;

use domain::trigger::entity::TriggerDefinition;
use serde::{Deserialize, Serialize};

use crate::constants::{COMMAND_CHANNEL_CAPACITY, FACT_CHANNEL_CAPACITY};
use common::{MAX_ACTIONS, MAX_PLUGINS, MAX_TRIGGERS, check_limit, warn_if_world_readable};

/// Property keys whose values are masked by [`AlertForgeConfig::sanitized`].
const SENSITIVE_KEY_PARTS: [&str; 4] = ["password", "secret", "token", "key"];

// ── Top-level config ───────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlertForgeConfig {
    #[serde(default)]
    pub agent: AgentInfo,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub plugins: Vec<PluginConfig>,

    #[serde(default)]
    pub actions: Vec<ActionConfig>,

    #[serde(default)]
    pub triggers: Vec<TriggerConfig>,
}

impl AlertForgeConfig {
    /// Load config from a YAML file.
    ///
    /// On Unix, logs a warning if the config file is world-readable, since
    /// plugin properties may contain credentials.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        warn_if_world_readable(path, "config file");
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Return a copy of the config with credential-like properties masked.
    #[must_use]
    pub fn sanitized(&self) -> Self {
        let mut sanitized = self.clone();
        let maps = sanitized
            .plugins
            .iter_mut()
            .map(|p| &mut p.properties)
            .chain(sanitized.actions.iter_mut().map(|a| &mut a.properties));
        for properties in maps {
            for (key, value) in properties.iter_mut() {
                let key = key.to_lowercase();
                if SENSITIVE_KEY_PARTS.iter().any(|part| key.contains(part)) {
                    *value = "***".to_string();
                }
            }
        }
        sanitized
    }

    /// Validate the config after deserialization.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.agent.validate()?;
        self.dispatch.validate()?;

        // ── Security: enforce count limits ───────────────────────
        check_limit("plugins", self.plugins.len(), MAX_PLUGINS)?;
        check_limit("actions", self.actions.len(), MAX_ACTIONS)?;
        check_limit("triggers", self.triggers.len(), MAX_TRIGGERS)?;

        let mut plugin_names = HashSet::new();
        for (idx, plugin) in self.plugins.iter().enumerate() {
            plugin.validate(idx)?;
            if !plugin_names.insert(plugin.name.as_str()) {
                return Err(ConfigError::Validation {
                    field: format!("plugins[{idx}].name"),
                    message: format!("duplicate plugin '{}'", plugin.name),
                });
            }
        }

        let mut action_keys = HashSet::new();
        for (idx, action) in self.actions.iter().enumerate() {
            action.validate(idx, &self.plugins)?;
            let key = (
                action.tenant_id.as_str(),
                action.plugin.as_str(),
                action.action_id.as_str(),
            );
            if !action_keys.insert(key) {
                return Err(ConfigError::Validation {
                    field: format!("actions[{idx}].action_id"),
                    message: format!(
                        "duplicate action '{}' for plugin '{}'",
                        action.action_id, action.plugin
                    ),
                });
            }
        }

        let has_wildcard = self.plugins.iter().any(PluginConfig::is_wildcard);
        let mut trigger_keys = HashSet::new();
        for (idx, trigger) in self.triggers.iter().enumerate() {
            trigger.validate(idx)?;
            if !trigger_keys.insert((trigger.tenant_id.as_str(), trigger.id.as_str())) {
                return Err(ConfigError::Validation {
                    field: format!("triggers[{idx}].id"),
                    message: format!("duplicate trigger '{}'", trigger.id),
                });
            }
            for (b, binding) in trigger.actions.iter().enumerate() {
                if !has_wildcard && !plugin_names.contains(binding.plugin.as_str()) {
                    return Err(ConfigError::Validation {
                        field: format!("triggers[{idx}].actions[{b}].plugin"),
                        message: format!("plugin '{}' is not declared in plugins", binding.plugin),
                    });
                }
                // Missing action definitions are skipped at dispatch time.
                if !action_keys.contains(&(
                    trigger.tenant_id.as_str(),
                    binding.plugin.as_str(),
                    binding.action_id.as_str(),
                )) {
                    tracing::warn!(
                        trigger_id = %trigger.id,
                        action_plugin = %binding.plugin,
                        action_id = %binding.action_id,
                        "trigger binding references an undefined action"
                    );
                }
            }
        }

        Ok(())
    }

    /// Domain definitions of every configured trigger.
    pub fn trigger_definitions(&self) -> Result<Vec<TriggerDefinition>, ConfigError> {
        self.triggers
            .iter()
            .map(TriggerConfig::to_domain_definition)
            .collect()
    }
}

// ── Agent section ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInfo {
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,

    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,

    /// Fact batches buffered ahead of the engine.
    #[serde(default = "default_fact_channel_capacity")]
    pub fact_channel_capacity: usize,

    #[serde(default = "default_command_channel_capacity")]
    pub command_channel_capacity: usize,

    /// Pause between replayed ticks. Zero replays as fast as possible.
    #[serde(default)]
    pub tick_interval_ms: u64,
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}
fn default_log_format() -> LogFormat {
    LogFormat::Json
}
fn default_fact_channel_capacity() -> usize {
    FACT_CHANNEL_CAPACITY
}
fn default_command_channel_capacity() -> usize {
    COMMAND_CHANNEL_CAPACITY
}

impl Default for AgentInfo {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            fact_channel_capacity: default_fact_channel_capacity(),
            command_channel_capacity: default_command_channel_capacity(),
            tick_interval_ms: 0,
        }
    }
}

impl AgentInfo {
    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("agent.fact_channel_capacity", self.fact_channel_capacity),
            ("agent.command_channel_capacity", self.command_channel_capacity),
        ] {
            if value == 0 {
                return Err(ConfigError::Validation {
                    field: field.to_string(),
                    message: "must be greater than 0".to_string(),
                });
            }
        }
        Ok(())
    }
}

// ── Log level ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(format!(
                "invalid log level '{s}': expected error|warn|info|debug|trace"
            )),
        }
    }
}

// ── Log format ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Text => "text",
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" | "pretty" => Ok(Self::Text),
            _ => Err(format!("invalid log format '{s}': expected json|text")),
        }
    }
}
