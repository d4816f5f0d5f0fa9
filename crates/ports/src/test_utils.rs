use crate::secondary::metrics_port::{ActionMetrics, AlertMetrics, EvaluationMetrics};

/// No-op implementation of all metrics sub-traits for use in tests.
///
/// All methods inherit the default no-op implementations from the sub-traits.
pub struct NoopMetrics;

impl EvaluationMetrics for NoopMetrics {}
impl AlertMetrics for NoopMetrics {}
impl ActionMetrics for NoopMetrics {}
