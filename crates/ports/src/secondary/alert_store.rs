use domain::alert::entity::Alert;
use domain::alert::error::AlertError;
use domain::alert::query::AlertQuery;
use domain::common::entity::TenantId;

/// Pluggable alert store holding every alert and its latest lifecycle state.
pub trait AlertStore: Send + Sync {
    /// Insert or replace an alert, keyed by tenant and alert id.
    fn store_alert(&self, alert: &Alert) -> Result<(), AlertError>;

    /// Retrieve a single alert.
    fn get_alert(&self, tenant_id: &TenantId, alert_id: &str) -> Result<Option<Alert>, AlertError>;

    /// Query stored alerts matching the given filters.
    ///
    /// Results are returned in reverse chronological order (newest first).
    fn query_alerts(&self, query: &AlertQuery) -> Result<Vec<Alert>, AlertError>;

    /// Total number of stored alerts.
    fn alert_count(&self) -> Result<usize, AlertError>;
}
