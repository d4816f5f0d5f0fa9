use ports::secondary::metrics_port::{ActionMetrics, AlertMetrics, EvaluationMetrics};
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets_range};
use prometheus_client::registry::Registry;

// ── Label types ─────────────────────────────────────────────────────

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ReasonLabels {
    pub reason: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ModeLabels {
    pub mode: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct AlertLabels {
    pub status: String,
    pub severity: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OperationLabels {
    pub operation: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct PluginLabels {
    pub plugin: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct DropLabels {
    pub plugin: String,
    pub reason: String,
}

// ── Agent metrics registry ──────────────────────────────────────────

/// Prometheus metrics registry for the agent.
///
/// All metric families use interior mutability (atomics), so recording
/// metrics only requires `&self`. The registry itself is NOT Clone; wrap
/// in `Arc` for multi-task sharing.
pub struct AgentMetrics {
    registry: Registry,
    pub ticks_total: Counter,
    pub facts_total: Counter,
    pub tick_duration: Histogram,
    pub trigger_faults_total: Family<ReasonLabels, Counter>,
    pub dampening_decisions_total: Family<ModeLabels, Counter>,
    pub triggers_loaded: Gauge,
    pub alert_transitions_total: Family<AlertLabels, Counter>,
    pub invalid_transitions_total: Family<OperationLabels, Counter>,
    pub actions_queued_total: Family<PluginLabels, Counter>,
    pub actions_delivered_total: Family<PluginLabels, Counter>,
    pub actions_failed_total: Family<PluginLabels, Counter>,
    pub actions_dropped_total: Family<DropLabels, Counter>,
}

impl AgentMetrics {
    /// Create a new metrics registry with all metrics registered under
    /// the `alertforge` prefix.
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("alertforge");

        let ticks_total = Counter::default();
        registry.register("ticks", "Evaluation ticks processed", ticks_total.clone());

        let facts_total = Counter::default();
        registry.register("facts", "Facts evaluated across all ticks", facts_total.clone());

        // Exponential buckets from 10μs to 1s (12 buckets)
        let tick_duration = Histogram::new(exponential_buckets_range(0.000_01, 1.0, 12));
        registry.register(
            "tick_duration_seconds",
            "Wall-clock time spent evaluating one tick",
            tick_duration.clone(),
        );

        let trigger_faults_total = Family::<ReasonLabels, Counter>::default();
        registry.register(
            "trigger_faults",
            "Trigger evaluations isolated after an error or panic",
            trigger_faults_total.clone(),
        );

        let dampening_decisions_total = Family::<ModeLabels, Counter>::default();
        registry.register(
            "dampening_decisions",
            "Satisfied dampening decisions by trigger mode",
            dampening_decisions_total.clone(),
        );

        let triggers_loaded = Gauge::default();
        registry.register(
            "triggers_loaded",
            "Number of triggers held by the engine",
            triggers_loaded.clone(),
        );

        let alert_transitions_total = Family::<AlertLabels, Counter>::default();
        registry.register(
            "alert_transitions",
            "Alert lifecycle transitions by resulting status and severity",
            alert_transitions_total.clone(),
        );

        let invalid_transitions_total = Family::<OperationLabels, Counter>::default();
        registry.register(
            "invalid_transitions",
            "Rejected alert lifecycle operations",
            invalid_transitions_total.clone(),
        );

        let actions_queued_total = Family::<PluginLabels, Counter>::default();
        registry.register(
            "actions_queued",
            "Actions handed to a listener queue",
            actions_queued_total.clone(),
        );

        let actions_delivered_total = Family::<PluginLabels, Counter>::default();
        registry.register(
            "actions_delivered",
            "Actions processed successfully by a listener",
            actions_delivered_total.clone(),
        );

        let actions_failed_total = Family::<PluginLabels, Counter>::default();
        registry.register(
            "actions_failed",
            "Actions that exhausted their delivery attempts",
            actions_failed_total.clone(),
        );

        let actions_dropped_total = Family::<DropLabels, Counter>::default();
        registry.register(
            "actions_dropped",
            "Actions dropped before delivery",
            actions_dropped_total.clone(),
        );

        Self {
            registry,
            ticks_total,
            facts_total,
            tick_duration,
            trigger_faults_total,
            dampening_decisions_total,
            triggers_loaded,
            alert_transitions_total,
            invalid_transitions_total,
            actions_queued_total,
            actions_delivered_total,
            actions_failed_total,
            actions_dropped_total,
        }
    }

    /// Encode all registered metrics to `OpenMetrics` text format.
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, &self.registry)
            .expect("encoding metrics to string should not fail");
        buffer
    }
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn plugin(plugin: &str) -> PluginLabels {
    PluginLabels {
        plugin: plugin.to_string(),
    }
}

// ── Sub-trait implementations ──────────────────────────────────────

impl EvaluationMetrics for AgentMetrics {
    fn record_tick(&self, facts: u64) {
        self.ticks_total.inc();
        self.facts_total.inc_by(facts);
    }

    fn observe_tick_duration(&self, duration_seconds: f64) {
        self.tick_duration.observe(duration_seconds);
    }

    fn record_trigger_fault(&self, reason: &str) {
        self.trigger_faults_total
            .get_or_create(&ReasonLabels {
                reason: reason.to_string(),
            })
            .inc();
    }

    fn record_dampening_decision(&self, mode: &str) {
        self.dampening_decisions_total
            .get_or_create(&ModeLabels {
                mode: mode.to_string(),
            })
            .inc();
    }

    fn set_triggers_loaded(&self, count: u64) {
        self.triggers_loaded
            .set(count.try_into().unwrap_or(i64::MAX));
    }
}

impl AlertMetrics for AgentMetrics {
    fn record_alert_transition(&self, status: &str, severity: &str) {
        self.alert_transitions_total
            .get_or_create(&AlertLabels {
                status: status.to_string(),
                severity: severity.to_string(),
            })
            .inc();
    }

    fn record_invalid_transition(&self, operation: &str) {
        self.invalid_transitions_total
            .get_or_create(&OperationLabels {
                operation: operation.to_string(),
            })
            .inc();
    }
}

impl ActionMetrics for AgentMetrics {
    fn record_action_queued(&self, action_plugin: &str) {
        self.actions_queued_total.get_or_create(&plugin(action_plugin)).inc();
    }

    fn record_action_delivered(&self, action_plugin: &str) {
        self.actions_delivered_total.get_or_create(&plugin(action_plugin)).inc();
    }

    fn record_action_failed(&self, action_plugin: &str) {
        self.actions_failed_total.get_or_create(&plugin(action_plugin)).inc();
    }

    fn record_action_dropped(&self, action_plugin: &str, reason: &str) {
        self.actions_dropped_total
            .get_or_create(&DropLabels {
                plugin: action_plugin.to_string(),
                reason: reason.to_string(),
            })
            .inc();
    }
}
