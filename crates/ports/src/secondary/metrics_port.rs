// Focused sub-traits for recording Prometheus metrics, grouped by concern.
//
// All methods take `&self` because the underlying implementation uses
// atomic operations (interior mutability via `prometheus-client`).
//
// Default implementations are no-ops, allowing test mocks to implement
// only the sub-traits relevant to the service under test.

// ── Evaluation metrics ─────────────────────────────────────────────

pub trait EvaluationMetrics: Send + Sync {
    /// Record one evaluated tick and the number of facts it carried.
    fn record_tick(&self, _facts: u64) {}

    /// Observe the wall-clock duration of a tick in seconds.
    fn observe_tick_duration(&self, _duration_seconds: f64) {}

    /// Record a fault isolated while evaluating one trigger.
    fn record_trigger_fault(&self, _reason: &str) {}

    /// Record a dampening decision for a mode (`FIRING`/`AUTORESOLVE`).
    fn record_dampening_decision(&self, _mode: &str) {}

    /// Set the number of loaded triggers.
    fn set_triggers_loaded(&self, _count: u64) {}
}

// ── Alert lifecycle metrics ────────────────────────────────────────

pub trait AlertMetrics: Send + Sync {
    /// Record an alert reaching `status` with a given severity label.
    fn record_alert_transition(&self, _status: &str, _severity: &str) {}

    /// Record a rejected lifecycle transition.
    fn record_invalid_transition(&self, _operation: &str) {}
}

// ── Action dispatch metrics ────────────────────────────────────────

pub trait ActionMetrics: Send + Sync {
    /// Record an action handed to a listener queue.
    fn record_action_queued(&self, _plugin: &str) {}

    /// Record an action a listener processed successfully.
    fn record_action_delivered(&self, _plugin: &str) {}

    /// Record an action that exhausted its delivery attempts.
    fn record_action_failed(&self, _plugin: &str) {}

    /// Record an action dropped before delivery (`queue_full`,
    /// `definition_missing`, `no_listener`, ...).
    fn record_action_dropped(&self, _plugin: &str, _reason: &str) {}
}

// ── Composite super-trait ──────────────────────────────────────────

/// Unified metrics port composing all sub-traits.
///
/// Services accept `Arc<dyn MetricsPort>` for full access. The sub-traits
/// provide default no-op implementations so that test mocks only need to
/// override the methods they care about.
pub trait MetricsPort: EvaluationMetrics + AlertMetrics + ActionMetrics {}

/// Blanket implementation: any type implementing all sub-traits automatically
/// implements `MetricsPort`.
impl<T> MetricsPort for T where T: EvaluationMetrics + AlertMetrics + ActionMetrics {}
