use serde::{Deserialize, Serialize};

use crate::common::entity::{Severity, TenantId};
use crate::condition::entity::EvalSet;
use crate::dampening::engine::DampeningSnapshot;
use crate::trigger::entity::Trigger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    Open,
    Acknowledged,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Acknowledged => "ACKNOWLEDGED",
            Self::Resolved => "RESOLVED",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Resolved
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of an alert's status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEntry {
    pub status: AlertStatus,
    pub user: String,
    pub stime: i64,
}

/// A firing episode of a trigger.
///
/// The JSON field names are consumed by external tools and must not change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub tenant_id: TenantId,
    pub alert_id: String,
    /// Trigger definition at the time the alert was opened.
    pub trigger: Trigger,
    pub dampening: DampeningSnapshot,
    pub eval_sets: Vec<EvalSet>,
    pub severity: Severity,
    pub status: AlertStatus,
    pub ctime: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_eval_sets: Option<Vec<EvalSet>>,
    #[serde(default)]
    pub lifecycle: Vec<LifecycleEntry>,
}

impl Alert {
    pub fn trigger_id(&self) -> &str {
        &self.trigger.id.0
    }

    pub fn is_resolved(&self) -> bool {
        self.status.is_terminal()
    }
}
