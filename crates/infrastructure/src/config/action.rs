//! Action plugins, action definitions and dispatch tuning.

use std::collections::BTreeMap;

use domain::action::entity::Properties;
use domain::common::entity::TenantId;
use serde::{Deserialize, Serialize};

use super::common::{ConfigError, MAX_BACKOFF_STEPS, check_limit, invalid, require_non_empty};

/// Plugin name receiving every action.
pub const WILDCARD_PLUGIN: &str = "*";

// ── Dispatch ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Bounded queue length per registered listener.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Delivery retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Backoff before each retry. The last entry repeats.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: Vec<u64>,

    /// Per-attempt delivery timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_queue_capacity() -> usize {
    256
}
fn default_max_retries() -> usize {
    2
}
fn default_backoff_ms() -> Vec<u64> {
    vec![200, 1_000]
}
fn default_timeout_ms() -> u64 {
    5_000
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl DispatchConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::Validation {
                field: "dispatch.queue_capacity".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::Validation {
                field: "dispatch.timeout_ms".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        check_limit("dispatch.backoff_ms", self.backoff_ms.len(), MAX_BACKOFF_STEPS)
    }
}

// ── Plugins ────────────────────────────────────────────────────────

/// Listener adapter handling a plugin's actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerKind {
    #[default]
    Log,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Plugin name referenced by trigger bindings, or `*` for all actions.
    pub name: String,

    #[serde(default)]
    pub listener: ListenerKind,

    /// Base directory for the `file` listener.
    #[serde(default)]
    pub directory: Option<String>,

    /// Default properties merged under every action of this plugin.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl PluginConfig {
    pub(super) fn validate(&self, idx: usize) -> Result<(), ConfigError> {
        let prefix = format!("plugins[{idx}]");
        require_non_empty(&format!("{prefix}.name"), &self.name)?;
        if self.listener == ListenerKind::File
            && self.directory.as_deref().is_none_or(|d| d.trim().is_empty())
        {
            return Err(ConfigError::Validation {
                field: format!("{prefix}.directory"),
                message: "file listener requires a directory".to_string(),
            });
        }
        Ok(())
    }

    pub fn is_wildcard(&self) -> bool {
        self.name == WILDCARD_PLUGIN
    }

    pub fn default_properties(&self) -> Properties {
        self.properties.clone()
    }
}

// ── Actions ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionConfig {
    #[serde(default = "default_tenant")]
    pub tenant_id: String,

    pub plugin: String,

    pub action_id: String,

    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

fn default_tenant() -> String {
    "default".to_string()
}

impl ActionConfig {
    pub(super) fn validate(&self, idx: usize, plugins: &[PluginConfig]) -> Result<(), ConfigError> {
        let prefix = format!("actions[{idx}]");
        require_non_empty(&format!("{prefix}.tenant_id"), &self.tenant_id)?;
        require_non_empty(&format!("{prefix}.plugin"), &self.plugin)?;
        require_non_empty(&format!("{prefix}.action_id"), &self.action_id)?;

        if self.plugin == WILDCARD_PLUGIN {
            return Err(invalid(
                &format!("{prefix}.plugin"),
                &self.plugin,
                "a concrete plugin name",
            ));
        }
        if !plugins.iter().any(|p| p.name == self.plugin) {
            return Err(ConfigError::Validation {
                field: format!("{prefix}.plugin"),
                message: format!("plugin '{}' is not declared in plugins", self.plugin),
            });
        }
        Ok(())
    }

    pub fn tenant(&self) -> TenantId {
        TenantId(self.tenant_id.clone())
    }

    pub fn to_domain_properties(&self) -> Properties {
        self.properties.clone()
    }
}
