use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::error::ConditionError;
use crate::common::entity::{Mode, TenantId, TriggerId};
use crate::fact::entity::FactKey;

// ── Operators ──────────────────────────────────────────────────────

/// Numeric comparison used by threshold, compare and rate conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompareOperator {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    Ne,
}

impl CompareOperator {
    #[allow(clippy::float_cmp)]
    pub fn apply(self, left: f64, right: f64) -> bool {
        match self {
            Self::Lt => left < right,
            Self::Lte => left <= right,
            Self::Gt => left > right,
            Self::Gte => left >= right,
            Self::Eq => left == right,
            Self::Ne => left != right,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lt => "LT",
            Self::Lte => "LTE",
            Self::Gt => "GT",
            Self::Gte => "GTE",
            Self::Eq => "EQ",
            Self::Ne => "NE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AvailabilityOperator {
    Down,
    NotUp,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RangeBound {
    Inclusive,
    Exclusive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StringOperator {
    Equal,
    NotEqual,
    StartsWith,
    EndsWith,
    Contains,
    Match,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateDirection {
    Increasing,
    Decreasing,
    Na,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RatePeriod {
    Second,
    Minute,
    Hour,
    Day,
}

impl RatePeriod {
    pub fn as_millis(self) -> i64 {
        match self {
            Self::Second => 1_000,
            Self::Minute => 60_000,
            Self::Hour => 3_600_000,
            Self::Day => 86_400_000,
        }
    }
}

// ── Condition kinds ────────────────────────────────────────────────

/// Kind-specific parameters of a condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionKind {
    /// `value <op> threshold`
    #[serde(rename_all = "camelCase")]
    Threshold {
        data_id: String,
        operator: CompareOperator,
        threshold: f64,
    },

    /// Value inside (or outside) `[low, high]` with per-bound inclusivity.
    #[serde(rename_all = "camelCase")]
    ThresholdRange {
        data_id: String,
        operator_low: RangeBound,
        operator_high: RangeBound,
        threshold_low: f64,
        threshold_high: f64,
        in_range: bool,
    },

    #[serde(rename_all = "camelCase")]
    Availability {
        data_id: String,
        operator: AvailabilityOperator,
    },

    /// `data1 <op> data2_multiplier * data2`
    #[serde(rename_all = "camelCase")]
    Compare {
        data_id: String,
        operator: CompareOperator,
        data2_id: String,
        data2_multiplier: f64,
    },

    #[serde(rename = "STRING", rename_all = "camelCase")]
    StringMatch {
        data_id: String,
        operator: StringOperator,
        pattern: String,
        #[serde(default)]
        ignore_case: bool,
    },

    /// Rate of change per `period` between consecutive points of one data id.
    #[serde(rename_all = "camelCase")]
    Rate {
        data_id: String,
        direction: RateDirection,
        period: RatePeriod,
        operator: CompareOperator,
        threshold: f64,
    },

    /// Event expression. Without `data_id` it sees every event addressed to
    /// the trigger or to nobody in particular.
    #[serde(rename_all = "camelCase")]
    Event {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data_id: Option<String>,
        expression: String,
    },
}

impl ConditionKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Threshold { .. } => "THRESHOLD",
            Self::ThresholdRange { .. } => "THRESHOLD_RANGE",
            Self::Availability { .. } => "AVAILABILITY",
            Self::Compare { .. } => "COMPARE",
            Self::StringMatch { .. } => "STRING",
            Self::Rate { .. } => "RATE",
            Self::Event { .. } => "EVENT",
        }
    }

    /// Data ids whose facts feed this condition.
    pub fn data_ids(&self) -> Vec<&str> {
        match self {
            Self::Threshold { data_id, .. }
            | Self::ThresholdRange { data_id, .. }
            | Self::Availability { data_id, .. }
            | Self::StringMatch { data_id, .. }
            | Self::Rate { data_id, .. } => vec![data_id.as_str()],
            Self::Compare {
                data_id, data2_id, ..
            } => vec![data_id.as_str(), data2_id.as_str()],
            Self::Event { data_id, .. } => data_id.iter().map(String::as_str).collect(),
        }
    }
}

// ── Condition ──────────────────────────────────────────────────────

/// One predicate of a trigger's condition set for a given mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub tenant_id: TenantId,
    pub trigger_id: TriggerId,
    pub trigger_mode: Mode,
    pub condition_set_size: usize,
    /// Zero-based position in the set.
    pub condition_set_index: usize,
    #[serde(flatten)]
    pub kind: ConditionKind,
}

impl Condition {
    pub fn condition_id(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            self.trigger_id, self.trigger_mode, self.condition_set_size, self.condition_set_index
        )
    }

    /// Check the condition on its own (set membership is checked by
    /// [`validate_condition_set`]).
    pub fn validate(&self) -> Result<(), ConditionError> {
        if self.condition_set_size == 0 {
            return Err(ConditionError::EmptySet);
        }
        if self.condition_set_index >= self.condition_set_size {
            return Err(ConditionError::IndexOutOfRange {
                index: self.condition_set_index,
                size: self.condition_set_size,
            });
        }
        for data_id in self.kind.data_ids() {
            if data_id.is_empty() {
                return Err(ConditionError::InvalidParameter(
                    "data id must not be empty".to_string(),
                ));
            }
        }
        match &self.kind {
            ConditionKind::ThresholdRange {
                threshold_low,
                threshold_high,
                ..
            } if threshold_low > threshold_high => Err(ConditionError::InvalidParameter(format!(
                "range low {threshold_low} exceeds high {threshold_high}"
            ))),
            ConditionKind::Compare { data2_multiplier, .. } if !data2_multiplier.is_finite() => {
                Err(ConditionError::InvalidParameter(
                    "data2 multiplier must be finite".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Check that the conditions of one (trigger, mode) form a complete set:
/// consistent size and exactly one condition per index.
pub fn validate_condition_set(mode: Mode, conditions: &[&Condition]) -> Result<(), ConditionError> {
    let Some(first) = conditions.first() else {
        return Ok(());
    };
    let size = first.condition_set_size;
    let mut seen = vec![false; size];

    for condition in conditions {
        condition.validate()?;
        if condition.condition_set_size != size {
            return Err(ConditionError::InconsistentSetSize {
                mode,
                first: size,
                other: condition.condition_set_size,
            });
        }
        let slot = &mut seen[condition.condition_set_index];
        if *slot {
            return Err(ConditionError::DuplicateIndex {
                mode,
                index: condition.condition_set_index,
            });
        }
        *slot = true;
    }

    match seen.iter().position(|s| !s) {
        Some(index) => Err(ConditionError::MissingIndex { mode, index }),
        None => Ok(()),
    }
}

// ── Evaluation results ─────────────────────────────────────────────

/// Outcome of evaluating one condition against one fact.
///
/// Equality, ordering and hashing only consider the condition id and the
/// fact identity, so an eval-set keeps one entry per (condition, fact).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionEval {
    pub condition_id: String,
    pub condition_set_index: usize,
    #[serde(rename = "type")]
    pub condition_type: String,
    #[serde(rename = "match")]
    pub matched: bool,
    pub eval_timestamp: i64,
    pub fact: FactKey,
    /// Human-readable summary, e.g. `cpu: 1001 GT 1000`.
    pub display: String,
}

impl PartialEq for ConditionEval {
    fn eq(&self, other: &Self) -> bool {
        self.condition_id == other.condition_id && self.fact == other.fact
    }
}

impl Eq for ConditionEval {}

impl std::hash::Hash for ConditionEval {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.condition_id.hash(state);
        self.fact.hash(state);
    }
}

impl PartialOrd for ConditionEval {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ConditionEval {
    fn cmp(&self, other: &Self) -> Ordering {
        self.condition_id
            .cmp(&other.condition_id)
            .then_with(|| self.fact.cmp(&other.fact))
    }
}

/// Deduplicated, ordered collection of evals covering a condition set.
pub type EvalSet = BTreeSet<ConditionEval>;

#[cfg(test)]
mod tests {
    use super::*;

    fn make_condition(mode: Mode, size: usize, index: usize) -> Condition {
        Condition {
            tenant_id: TenantId("tenant".to_string()),
            trigger_id: TriggerId("trigger-1".to_string()),
            trigger_mode: mode,
            condition_set_size: size,
            condition_set_index: index,
            kind: ConditionKind::Threshold {
                data_id: "cpu".to_string(),
                operator: CompareOperator::Gt,
                threshold: 1000.0,
            },
        }
    }

    fn make_eval(condition_id: &str, data_id: &str, ts: i64, matched: bool) -> ConditionEval {
        ConditionEval {
            condition_id: condition_id.to_string(),
            condition_set_index: 0,
            condition_type: "THRESHOLD".to_string(),
            matched,
            eval_timestamp: ts,
            fact: FactKey::Data {
                data_id: data_id.to_string(),
                timestamp: ts,
            },
            display: String::new(),
        }
    }

    // ── Operators ─────────────────────────────────────────────────

    #[test]
    fn compare_operator_apply() {
        assert!(CompareOperator::Gt.apply(1001.0, 1000.0));
        assert!(!CompareOperator::Gt.apply(1000.0, 1000.0));
        assert!(CompareOperator::Gte.apply(1000.0, 1000.0));
        assert!(CompareOperator::Lte.apply(998.0, 1000.0));
        assert!(CompareOperator::Eq.apply(5.0, 5.0));
        assert!(CompareOperator::Ne.apply(5.0, 6.0));
    }

    #[test]
    fn rate_period_millis() {
        assert_eq!(RatePeriod::Minute.as_millis(), 60_000);
        assert_eq!(RatePeriod::Day.as_millis(), 86_400_000);
    }

    // ── Condition ─────────────────────────────────────────────────

    #[test]
    fn condition_id_format() {
        let c = make_condition(Mode::Autoresolve, 2, 1);
        assert_eq!(c.condition_id(), "trigger-1-AUTORESOLVE-2-1");
    }

    #[test]
    fn index_must_be_below_size() {
        assert!(make_condition(Mode::Firing, 2, 1).validate().is_ok());
        assert_eq!(
            make_condition(Mode::Firing, 2, 2).validate(),
            Err(ConditionError::IndexOutOfRange { index: 2, size: 2 })
        );
        assert_eq!(
            make_condition(Mode::Firing, 0, 0).validate(),
            Err(ConditionError::EmptySet)
        );
    }

    #[test]
    fn range_bounds_validated() {
        let mut c = make_condition(Mode::Firing, 1, 0);
        c.kind = ConditionKind::ThresholdRange {
            data_id: "cpu".to_string(),
            operator_low: RangeBound::Inclusive,
            operator_high: RangeBound::Inclusive,
            threshold_low: 10.0,
            threshold_high: 5.0,
            in_range: true,
        };
        assert!(matches!(
            c.validate(),
            Err(ConditionError::InvalidParameter(_))
        ));
    }

    #[test]
    fn kind_json_shape() {
        let c = make_condition(Mode::Firing, 1, 0);
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["type"], "THRESHOLD");
        assert_eq!(json["dataId"], "cpu");
        assert_eq!(json["operator"], "GT");
        assert_eq!(json["triggerMode"], "FIRING");
    }

    #[test]
    fn compare_kind_lists_both_ids() {
        let kind = ConditionKind::Compare {
            data_id: "used".to_string(),
            operator: CompareOperator::Gt,
            data2_id: "total".to_string(),
            data2_multiplier: 0.9,
        };
        assert_eq!(kind.data_ids(), vec!["used", "total"]);
    }

    // ── Condition sets ────────────────────────────────────────────

    #[test]
    fn complete_set_accepted() {
        let a = make_condition(Mode::Firing, 2, 0);
        let b = make_condition(Mode::Firing, 2, 1);
        assert!(validate_condition_set(Mode::Firing, &[&a, &b]).is_ok());
    }

    #[test]
    fn missing_index_rejected() {
        let a = make_condition(Mode::Firing, 3, 0);
        let b = make_condition(Mode::Firing, 3, 2);
        assert_eq!(
            validate_condition_set(Mode::Firing, &[&a, &b]),
            Err(ConditionError::MissingIndex {
                mode: Mode::Firing,
                index: 1
            })
        );
    }

    #[test]
    fn duplicate_index_rejected() {
        let a = make_condition(Mode::Firing, 2, 0);
        let b = make_condition(Mode::Firing, 2, 0);
        assert!(matches!(
            validate_condition_set(Mode::Firing, &[&a, &b]),
            Err(ConditionError::DuplicateIndex { index: 0, .. })
        ));
    }

    #[test]
    fn inconsistent_size_rejected() {
        let a = make_condition(Mode::Firing, 2, 0);
        let b = make_condition(Mode::Firing, 3, 1);
        assert!(matches!(
            validate_condition_set(Mode::Firing, &[&a, &b]),
            Err(ConditionError::InconsistentSetSize { .. })
        ));
    }

    // ── Eval identity ─────────────────────────────────────────────

    #[test]
    fn evals_dedup_by_condition_and_fact() {
        let mut set = EvalSet::new();
        set.insert(make_eval("c-0", "cpu", 1, true));
        set.insert(make_eval("c-0", "cpu", 1, false));
        set.insert(make_eval("c-0", "cpu", 2, true));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn eval_json_uses_match_key() {
        let json = serde_json::to_value(make_eval("c-0", "cpu", 1, true)).unwrap();
        assert_eq!(json["match"], true);
        assert_eq!(json["conditionId"], "c-0");
        assert_eq!(json["fact"]["dataId"], "cpu");
    }
}
