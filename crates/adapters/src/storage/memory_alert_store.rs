use std::collections::HashMap;
use std::sync::RwLock;

use domain::alert::entity::Alert;
use domain::alert::error::AlertError;
use domain::alert::query::AlertQuery;
use domain::common::entity::TenantId;
use ports::secondary::alert_store::AlertStore;

/// Maximum number of alerts to keep before resolved ones are evicted.
const DEFAULT_MAX_ALERTS: usize = 50_000;

type AlertKey = (TenantId, String);

/// Alert store kept in process memory.
///
/// Alerts are keyed by tenant and alert id; storing an existing key replaces
/// the previous lifecycle state, but never with a shorter lifecycle. Only
/// resolved alerts are evicted (oldest first) once the store holds more than
/// `max_alerts`; OPEN and ACKNOWLEDGED alerts are always kept.
pub struct InMemoryAlertStore {
    alerts: RwLock<HashMap<AlertKey, Alert>>,
    max_alerts: usize,
}

impl Default for InMemoryAlertStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAlertStore {
    pub fn new() -> Self {
        Self::with_max(DEFAULT_MAX_ALERTS)
    }

    /// Store with a custom max alerts limit (useful for testing).
    pub fn with_max(max_alerts: usize) -> Self {
        Self {
            alerts: RwLock::new(HashMap::new()),
            max_alerts: max_alerts.max(1),
        }
    }

    fn evict_if_needed(&self, alerts: &mut HashMap<AlertKey, Alert>) {
        if alerts.len() <= self.max_alerts {
            return;
        }
        let excess = alerts.len() - self.max_alerts;

        let mut resolved: Vec<(i64, AlertKey)> = alerts
            .iter()
            .filter(|(_, a)| a.is_resolved())
            .map(|(k, a)| (a.ctime, k.clone()))
            .collect();
        resolved.sort();

        let evicted = excess.min(resolved.len());
        for (_, key) in resolved.into_iter().take(evicted) {
            alerts.remove(&key);
        }
        if evicted > 0 {
            tracing::debug!(evicted, "alert store evicted resolved alerts");
        }
        if evicted < excess {
            tracing::warn!(
                stored = alerts.len(),
                max_alerts = self.max_alerts,
                "alert store over capacity with unresolved alerts only"
            );
        }
    }
}

impl AlertStore for InMemoryAlertStore {
    fn store_alert(&self, alert: &Alert) -> Result<(), AlertError> {
        let mut alerts = self
            .alerts
            .write()
            .map_err(|e| AlertError::StoreFailed(format!("lock poisoned: {e}")))?;
        let key = (alert.tenant_id.clone(), alert.alert_id.clone());
        if let Some(existing) = alerts.get(&key)
            && existing.lifecycle.len() > alert.lifecycle.len()
        {
            return Err(AlertError::StoreFailed(format!(
                "alert {} would lose lifecycle history ({} -> {})",
                alert.alert_id, existing.status, alert.status
            )));
        }
        alerts.insert(key, alert.clone());
        self.evict_if_needed(&mut alerts);
        Ok(())
    }

    fn get_alert(&self, tenant_id: &TenantId, alert_id: &str) -> Result<Option<Alert>, AlertError> {
        let alerts = self
            .alerts
            .read()
            .map_err(|e| AlertError::QueryFailed(format!("lock poisoned: {e}")))?;
        Ok(alerts
            .get(&(tenant_id.clone(), alert_id.to_string()))
            .cloned())
    }

    fn query_alerts(&self, query: &AlertQuery) -> Result<Vec<Alert>, AlertError> {
        let alerts = self
            .alerts
            .read()
            .map_err(|e| AlertError::QueryFailed(format!("lock poisoned: {e}")))?;

        let mut matched: Vec<Alert> = alerts
            .values()
            .filter(|a| query.matches(a))
            .cloned()
            .collect();
        drop(alerts);

        // Newest first; alert id breaks ties so the order is stable.
        matched.sort_by(|a, b| b.ctime.cmp(&a.ctime).then_with(|| a.alert_id.cmp(&b.alert_id)));

        let total = matched.len();
        let start = query.offset.min(total);
        let end = if query.limit == 0 {
            total
        } else {
            start.saturating_add(query.limit).min(total)
        };
        Ok(matched.drain(start..end).collect())
    }

    fn alert_count(&self) -> Result<usize, AlertError> {
        self.alerts
            .read()
            .map(|a| a.len())
            .map_err(|e| AlertError::QueryFailed(format!("lock poisoned: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::alert::entity::AlertStatus;
    use domain::common::entity::{Mode, Severity, TriggerId};
    use domain::dampening::engine::DampeningSnapshot;
    use domain::dampening::entity::Dampening;
    use domain::trigger::entity::Trigger;

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

    fn tenant(name: &str) -> TenantId {
        TenantId(name.to_string())
    }

    #[test]
    fn store_and_get_alert() {
        let store = InMemoryAlertStore::new();
        store
            .store_alert(&make_alert("acme", "cpu", Severity::High, 1000))
            .unwrap();

        let a = store.get_alert(&tenant("acme"), "cpu-1000").unwrap().unwrap();
        assert_eq!(a.status, AlertStatus::Open);
        assert!(store.get_alert(&tenant("other"), "cpu-1000").unwrap().is_none());
    }

    #[test]
    fn get_nonexistent_returns_none() {
        let store = InMemoryAlertStore::new();
        assert!(store.get_alert(&tenant("acme"), "missing").unwrap().is_none());
    }

    #[test]
    fn storing_again_replaces_state() {
        let store = InMemoryAlertStore::new();
        let mut alert = make_alert("acme", "cpu", Severity::High, 1000);
        store.store_alert(&alert).unwrap();
        alert.acknowledge("alice", None, 1500).unwrap();
        store.store_alert(&alert).unwrap();

        assert_eq!(store.alert_count().unwrap(), 1);
        let a = store.get_alert(&tenant("acme"), "cpu-1000").unwrap().unwrap();
        assert_eq!(a.status, AlertStatus::Acknowledged);
        assert_eq!(a.lifecycle.len(), 2);
    }

    #[test]
    fn query_newest_first_with_filters() {
        let store = InMemoryAlertStore::new();
        store.store_alert(&make_alert("acme", "cpu", Severity::Low, 1)).unwrap();
        store.store_alert(&make_alert("acme", "cpu", Severity::High, 3)).unwrap();
        store.store_alert(&make_alert("acme", "disk", Severity::Critical, 2)).unwrap();
        store.store_alert(&make_alert("other", "cpu", Severity::High, 4)).unwrap();

        let q = AlertQuery {
            tenant_id: Some(tenant("acme")),
            ..AlertQuery::default()
        };
        let ids: Vec<String> = store
            .query_alerts(&q)
            .unwrap()
            .into_iter()
            .map(|a| a.alert_id)
            .collect();
        assert_eq!(ids, vec!["cpu-3", "disk-2", "cpu-1"]);

        let q = AlertQuery {
            tenant_id: Some(tenant("acme")),
            min_severity: Some(Severity::High),
            trigger_ids: vec!["cpu".to_string()],
            ..AlertQuery::default()
        };
        let result = store.query_alerts(&q).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].alert_id, "cpu-3");
    }

    #[test]
    fn query_limit_and_offset() {
        let store = InMemoryAlertStore::new();
        for ts in 1..=5 {
            store.store_alert(&make_alert("acme", "cpu", Severity::Low, ts)).unwrap();
        }

        let q = AlertQuery {
            limit: 2,
            offset: 1,
            ..AlertQuery::default()
        };
        let ids: Vec<i64> = store.query_alerts(&q).unwrap().iter().map(|a| a.ctime).collect();
        assert_eq!(ids, vec![4, 3]);

        let q = AlertQuery {
            offset: 10,
            ..AlertQuery::default()
        };
        assert!(store.query_alerts(&q).unwrap().is_empty());
    }

    #[test]
    fn unresolved_query_skips_resolved() {
        let store = InMemoryAlertStore::new();
        let mut resolved = make_alert("acme", "cpu", Severity::Low, 1);
        resolved.resolve("bob", None, None, true, 2).unwrap();
        store.store_alert(&resolved).unwrap();
        store.store_alert(&make_alert("acme", "cpu", Severity::Low, 3)).unwrap();

        let open = store
            .query_alerts(&AlertQuery::unresolved_for(&tenant("acme"), "cpu"))
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].alert_id, "cpu-3");
    }

    #[test]
    fn eviction_removes_oldest_resolved_only() {
        let store = InMemoryAlertStore::with_max(2);
        let mut resolved = make_alert("acme", "cpu", Severity::Low, 5);
        resolved.resolve("bob", None, None, true, 6).unwrap();
        store.store_alert(&make_alert("acme", "cpu", Severity::Low, 1)).unwrap();
        store.store_alert(&resolved).unwrap();
        store.store_alert(&make_alert("acme", "cpu", Severity::Low, 9)).unwrap();

        assert_eq!(store.alert_count().unwrap(), 2);
        assert!(store.get_alert(&tenant("acme"), "cpu-5").unwrap().is_none());
        assert!(store.get_alert(&tenant("acme"), "cpu-1").unwrap().is_some());
    }

    #[test]
    fn unresolved_alerts_never_evicted() {
        let store = InMemoryAlertStore::with_max(2);
        for ts in 1..=4 {
            store.store_alert(&make_alert("acme", "cpu", Severity::Low, ts)).unwrap();
        }
        assert_eq!(store.alert_count().unwrap(), 4);
        assert!(store.get_alert(&tenant("acme"), "cpu-1").unwrap().is_some());

        // a resolution makes room again
        let mut oldest = store.get_alert(&tenant("acme"), "cpu-1").unwrap().unwrap();
        oldest.resolve("bob", None, None, true, 10).unwrap();
        store.store_alert(&oldest).unwrap();
        assert_eq!(store.alert_count().unwrap(), 3);
        assert!(store.get_alert(&tenant("acme"), "cpu-1").unwrap().is_none());
    }

    #[test]
    fn fresh_alert_cannot_overwrite_progressed_one() {
        let store = InMemoryAlertStore::new();
        let mut acked = make_alert("acme", "cpu", Severity::High, 100);
        acked.acknowledge("alice", None, 150).unwrap();
        store.store_alert(&acked).unwrap();

        let err = store
            .store_alert(&make_alert("acme", "cpu", Severity::High, 100))
            .unwrap_err();
        assert!(matches!(err, AlertError::StoreFailed(_)));
        let kept = store.get_alert(&tenant("acme"), "cpu-100").unwrap().unwrap();
        assert_eq!(kept.status, AlertStatus::Acknowledged);
        assert_eq!(kept.ack_by.as_deref(), Some("alice"));
    }
}
