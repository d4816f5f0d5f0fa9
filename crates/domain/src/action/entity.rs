use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::alert::entity::{Alert, AlertStatus};
use crate::common::entity::TenantId;
use crate::trigger::entity::TriggerAction;

/// Resolved property map of an action.
pub type Properties = BTreeMap<String, String>;

/// Notification intent for one alert transition, handed to a plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub tenant_id: TenantId,
    pub action_plugin: String,
    pub action_id: String,
    pub alert_id: String,
    pub ctime: i64,
    pub alert: Alert,
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Action {
    /// Build the action for `binding` after `alert` reached its current status.
    pub fn new(alert: &Alert, binding: &TriggerAction, properties: Properties, ctime: i64) -> Self {
        Self {
            tenant_id: alert.tenant_id.clone(),
            action_plugin: binding.action_plugin.clone(),
            action_id: binding.action_id.clone(),
            alert_id: alert.alert_id.clone(),
            ctime,
            alert: alert.clone(),
            properties,
            message: Some(default_message(alert)),
        }
    }
}

/// Overlay action-specific properties on the plugin defaults. Specific values
/// win on key collision.
pub fn merge_properties(defaults: &Properties, specific: &Properties) -> Properties {
    let mut merged = defaults.clone();
    merged.extend(specific.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Bindings of the alert's trigger that notify on `status`.
pub fn bindings_for(alert: &Alert, status: AlertStatus) -> impl Iterator<Item = &TriggerAction> {
    alert
        .trigger
        .actions
        .iter()
        .filter(move |b| b.notifies_on(status))
}

fn default_message(alert: &Alert) -> String {
    format!(
        "[{}] {} alert {} for trigger {}",
        alert.severity.as_label(),
        alert.status,
        alert.alert_id,
        alert.trigger.name
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::entity::{Mode, TriggerId};
    use crate::dampening::engine::DampeningSnapshot;
    use crate::dampening::entity::Dampening;
    use crate::trigger::entity::Trigger;

    fn props(pairs: &[(&str, &str)]) -> Properties {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn make_binding(plugin: &str, id: &str, states: Vec<AlertStatus>) -> TriggerAction {
        TriggerAction {
            action_plugin: plugin.to_string(),
            action_id: id.to_string(),
            states,
        }
    }

    fn make_alert() -> Alert {
        let mut t = Trigger::new(
            TenantId("tenant".to_string()),
            TriggerId("trigger-1".to_string()),
            "CPU high",
        );
        t.actions = vec![
            make_binding("email", "ops", Vec::new()),
            make_binding("sms", "oncall", vec![AlertStatus::Open]),
        ];
        let snapshot = DampeningSnapshot {
            dampening: Dampening::default_for(t.tenant_id.clone(), t.id.clone(), Mode::Firing),
            num_true_evals: 1,
            num_evals: 1,
            true_evals_start_time: None,
            satisfied_at: 10,
        };
        Alert::open(&t, snapshot, Vec::new(), 10)
    }

    // ── Properties ────────────────────────────────────────────────

    #[test]
    fn specific_properties_win() {
        let defaults = props(&[("to", "default@example.com"), ("cc", "team@example.com")]);
        let specific = props(&[("to", "admin@example.com")]);
        let merged = merge_properties(&defaults, &specific);
        assert_eq!(merged["to"], "admin@example.com");
        assert_eq!(merged["cc"], "team@example.com");
    }

    #[test]
    fn merge_with_empty_defaults() {
        let merged = merge_properties(&Properties::new(), &props(&[("a", "1")]));
        assert_eq!(merged, props(&[("a", "1")]));
    }

    // ── Bindings ──────────────────────────────────────────────────

    #[test]
    fn bindings_filtered_by_status() {
        let alert = make_alert();
        let open: Vec<_> = bindings_for(&alert, AlertStatus::Open)
            .map(|b| b.action_plugin.as_str())
            .collect();
        assert_eq!(open, vec!["email", "sms"]);

        let resolved: Vec<_> = bindings_for(&alert, AlertStatus::Resolved)
            .map(|b| b.action_plugin.as_str())
            .collect();
        assert_eq!(resolved, vec!["email"]);
    }

    // ── Action ────────────────────────────────────────────────────

    #[test]
    fn action_references_alert() {
        let alert = make_alert();
        let binding = &alert.trigger.actions[0];
        let action = Action::new(&alert, binding, props(&[("to", "x")]), 11);
        assert_eq!(action.alert_id, "trigger-1-10");
        assert_eq!(action.action_plugin, "email");
        assert!(action.message.as_deref().unwrap().contains("OPEN"));

        let json = serde_json::to_value(&action).unwrap();
        for field in ["tenantId", "actionPlugin", "actionId", "alert", "properties"] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
    }
}
