use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::TriggerError;
use crate::alert::entity::AlertStatus;
use crate::common::entity::{Mode, Severity, TenantId, TriggerId};
use crate::condition::entity::Condition;
use crate::dampening::entity::Dampening;

/// Binds a trigger to one configured action of a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerAction {
    pub action_plugin: String,
    pub action_id: String,
    /// Alert statuses that notify. Empty means every status.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub states: Vec<AlertStatus>,
}

impl TriggerAction {
    pub fn notifies_on(&self, status: AlertStatus) -> bool {
        self.states.is_empty() || self.states.contains(&status)
    }
}

fn default_true() -> bool {
    true
}

/// Tenant-scoped alert definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    pub tenant_id: TenantId,
    pub id: TriggerId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub mode: Mode,
    /// Disable the trigger after it fires.
    #[serde(default)]
    pub auto_disable: bool,
    /// Resolve open alerts when the AUTORESOLVE set is satisfied.
    #[serde(default = "default_true")]
    pub auto_resolve_alerts: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<TriggerAction>,
}

impl Trigger {
    pub fn new(tenant_id: TenantId, id: TriggerId, name: impl Into<String>) -> Self {
        Self {
            tenant_id,
            id,
            name: name.into(),
            description: None,
            severity: Severity::default(),
            enabled: true,
            mode: Mode::Firing,
            auto_disable: false,
            auto_resolve_alerts: true,
            context: BTreeMap::new(),
            actions: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), TriggerError> {
        self.tenant_id
            .validate()
            .map_err(TriggerError::InvalidDefinition)?;
        self.id.validate().map_err(TriggerError::InvalidDefinition)?;
        if self.name.trim().is_empty() {
            return Err(TriggerError::InvalidDefinition(
                "trigger name must not be empty".to_string(),
            ));
        }
        for action in &self.actions {
            if action.action_plugin.is_empty() || action.action_id.is_empty() {
                return Err(TriggerError::InvalidDefinition(
                    "action binding needs a plugin and an action id".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Everything needed to build a trigger runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerDefinition {
    pub trigger: Trigger,
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub dampenings: Vec<Dampening>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_trigger() -> Trigger {
        Trigger::new(
            TenantId("tenant".to_string()),
            TriggerId("trigger-1".to_string()),
            "CPU high",
        )
    }

    #[test]
    fn new_trigger_defaults() {
        let t = make_trigger();
        assert!(t.enabled);
        assert_eq!(t.mode, Mode::Firing);
        assert!(t.auto_resolve_alerts);
        assert!(!t.auto_disable);
        assert!(t.validate().is_ok());
    }

    #[test]
    fn empty_name_rejected() {
        let mut t = make_trigger();
        t.name = "  ".to_string();
        assert!(matches!(
            t.validate(),
            Err(TriggerError::InvalidDefinition(_))
        ));
    }

    #[test]
    fn bad_ids_rejected() {
        let mut t = make_trigger();
        t.id = TriggerId("a b".to_string());
        assert!(t.validate().is_err());
    }

    #[test]
    fn incomplete_action_binding_rejected() {
        let mut t = make_trigger();
        t.actions.push(TriggerAction {
            action_plugin: "email".to_string(),
            action_id: String::new(),
            states: Vec::new(),
        });
        assert!(t.validate().is_err());
    }

    #[test]
    fn action_states_filter() {
        let any = TriggerAction {
            action_plugin: "email".to_string(),
            action_id: "ops".to_string(),
            states: Vec::new(),
        };
        assert!(any.notifies_on(AlertStatus::Resolved));

        let open_only = TriggerAction {
            states: vec![AlertStatus::Open],
            ..any
        };
        assert!(open_only.notifies_on(AlertStatus::Open));
        assert!(!open_only.notifies_on(AlertStatus::Acknowledged));
    }

    #[test]
    fn deserializes_with_defaults() {
        let t: Trigger = serde_json::from_str(
            r#"{"tenantId":"tenant","id":"trigger-1","name":"CPU high"}"#,
        )
        .unwrap();
        assert_eq!(t, make_trigger());
    }
}
