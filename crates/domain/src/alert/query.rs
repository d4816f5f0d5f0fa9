use super::entity::{Alert, AlertStatus};
use crate::common::entity::{Severity, TenantId};

/// Filter parameters for querying stored alerts.
#[derive(Debug, Clone, Default)]
pub struct AlertQuery {
    /// Restrict to one tenant.
    pub tenant_id: Option<TenantId>,
    /// Restrict to these triggers (any of).
    pub trigger_ids: Vec<String>,
    /// Restrict to these statuses (any of).
    pub statuses: Vec<AlertStatus>,
    /// Filter by minimum severity.
    pub min_severity: Option<Severity>,
    /// Start of creation time range (inclusive, ms).
    pub start_time: Option<i64>,
    /// End of creation time range (inclusive, ms).
    pub end_time: Option<i64>,
    /// Maximum number of entries to return. Zero means unlimited.
    pub limit: usize,
    /// Number of entries to skip.
    pub offset: usize,
}

impl AlertQuery {
    /// Check whether an `Alert` matches all active filters.
    pub fn matches(&self, alert: &Alert) -> bool {
        if let Some(ref tenant) = self.tenant_id
            && alert.tenant_id != *tenant
        {
            return false;
        }
        if !self.trigger_ids.is_empty()
            && !self.trigger_ids.iter().any(|t| t == alert.trigger_id())
        {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&alert.status) {
            return false;
        }
        if let Some(min_sev) = self.min_severity
            && alert.severity.to_u8() < min_sev.to_u8()
        {
            return false;
        }
        if let Some(start) = self.start_time
            && alert.ctime < start
        {
            return false;
        }
        if let Some(end) = self.end_time
            && alert.ctime > end
        {
            return false;
        }
        true
    }

    /// Unresolved alerts of one trigger.
    pub fn unresolved_for(tenant_id: &TenantId, trigger_id: &str) -> Self {
        Self {
            tenant_id: Some(tenant_id.clone()),
            trigger_ids: vec![trigger_id.to_string()],
            statuses: vec![AlertStatus::Open, AlertStatus::Acknowledged],
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::entity::{Mode, TriggerId};
    use crate::dampening::engine::DampeningSnapshot;
    use crate::dampening::entity::Dampening;
    use crate::trigger::entity::Trigger;

    fn make_alert(tenant: &str, trigger: &str, severity: Severity, ctime: i64) -> Alert {
        let mut t = Trigger::new(
            TenantId(tenant.to_string()),
            TriggerId(trigger.to_string()),
            "test",
        );
        t.severity = severity;
        let snapshot = DampeningSnapshot {
            dampening: Dampening::default_for(t.tenant_id.clone(), t.id.clone(), Mode::Firing),
            num_true_evals: 1,
            num_evals: 1,
            true_evals_start_time: None,
            satisfied_at: ctime,
        };
        Alert::open(&t, snapshot, Vec::new(), ctime)
    }

    #[test]
    fn empty_query_matches_everything() {
        let q = AlertQuery::default();
        assert!(q.matches(&make_alert("t", "cpu", Severity::Low, 1)));
    }

    #[test]
    fn tenant_filter() {
        let q = AlertQuery {
            tenant_id: Some(TenantId("a".to_string())),
            ..Default::default()
        };
        assert!(q.matches(&make_alert("a", "cpu", Severity::Low, 1)));
        assert!(!q.matches(&make_alert("b", "cpu", Severity::Low, 1)));
    }

    #[test]
    fn trigger_filter_any_of() {
        let q = AlertQuery {
            trigger_ids: vec!["cpu".to_string(), "mem".to_string()],
            ..Default::default()
        };
        assert!(q.matches(&make_alert("t", "mem", Severity::Low, 1)));
        assert!(!q.matches(&make_alert("t", "disk", Severity::Low, 1)));
    }

    #[test]
    fn status_filter() {
        let mut alert = make_alert("t", "cpu", Severity::Low, 1);
        let q = AlertQuery {
            statuses: vec![AlertStatus::Resolved],
            ..Default::default()
        };
        assert!(!q.matches(&alert));
        alert.resolve("bob", None, None, true, 2).unwrap();
        assert!(q.matches(&alert));
    }

    #[test]
    fn min_severity_filter() {
        let q = AlertQuery {
            min_severity: Some(Severity::High),
            ..Default::default()
        };
        assert!(!q.matches(&make_alert("t", "cpu", Severity::Medium, 1)));
        assert!(q.matches(&make_alert("t", "cpu", Severity::High, 1)));
        assert!(q.matches(&make_alert("t", "cpu", Severity::Critical, 1)));
    }

    #[test]
    fn time_range_inclusive() {
        let q = AlertQuery {
            start_time: Some(10),
            end_time: Some(20),
            ..Default::default()
        };
        assert!(!q.matches(&make_alert("t", "cpu", Severity::Low, 9)));
        assert!(q.matches(&make_alert("t", "cpu", Severity::Low, 10)));
        assert!(q.matches(&make_alert("t", "cpu", Severity::Low, 20)));
        assert!(!q.matches(&make_alert("t", "cpu", Severity::Low, 21)));
    }

    #[test]
    fn unresolved_for_excludes_resolved() {
        let q = AlertQuery::unresolved_for(&TenantId("t".to_string()), "cpu");
        let mut alert = make_alert("t", "cpu", Severity::Low, 1);
        assert!(q.matches(&alert));
        alert.acknowledge("bob", None, 2).unwrap();
        assert!(q.matches(&alert));
        alert.resolve("bob", None, None, true, 3).unwrap();
        assert!(!q.matches(&alert));
    }
}
