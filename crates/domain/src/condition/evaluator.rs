use std::collections::HashMap;

use regex::Regex;

use super::entity::{
    AvailabilityOperator, Condition, ConditionEval, ConditionKind, RangeBound, RateDirection,
    StringOperator,
};
use super::error::ConditionError;
use crate::common::entity::TenantId;
use crate::common::pattern::compile_full_match;
use crate::expression::matcher::CompiledExpression;
use crate::fact::entity::{AvailabilityType, Data, DataValue, Fact};

// ── Data history ───────────────────────────────────────────────────

/// Last known data point per (tenant, data id), carried across ticks.
#[derive(Debug, Default)]
pub struct DataHistory {
    by_tenant: HashMap<TenantId, HashMap<String, Data>>,
}

impl DataHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tenant_id: &TenantId, data_id: &str) -> Option<&Data> {
        self.by_tenant.get(tenant_id)?.get(data_id)
    }

    /// Remember `data` unless a newer point for the same id is already known.
    pub fn record(&mut self, data: &Data) {
        let points = self.by_tenant.entry(data.tenant_id.clone()).or_default();
        match points.get(&data.data_id) {
            Some(existing) if existing.timestamp > data.timestamp => {}
            _ => {
                points.insert(data.data_id.clone(), data.clone());
            }
        }
    }

    pub fn record_tick(&mut self, facts: &[Fact]) {
        for fact in facts {
            if let Fact::Data(data) = fact {
                self.record(data);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.by_tenant.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Evaluation context ─────────────────────────────────────────────

/// Read-only view of the facts surrounding the one being evaluated.
pub struct EvalContext<'a> {
    /// Current tick, sorted by `(timestamp, identity)`.
    tick: &'a [Fact],
    /// Points from earlier ticks.
    history: &'a DataHistory,
}

impl<'a> EvalContext<'a> {
    pub fn new(tick: &'a [Fact], history: &'a DataHistory) -> Self {
        Self { tick, history }
    }

    /// Most recent point for `data_id`: this tick first, then history.
    pub fn latest(&self, tenant_id: &TenantId, data_id: &str) -> Option<&'a Data> {
        self.tick
            .iter()
            .rev()
            .find_map(|fact| match fact {
                Fact::Data(d) if d.tenant_id == *tenant_id && d.data_id == data_id => Some(d),
                _ => None,
            })
            .or_else(|| self.history.get(tenant_id, data_id))
    }

    /// Point of the same data id immediately preceding `data`.
    pub fn previous(&self, data: &Data) -> Option<&'a Data> {
        let earlier = |d: &&'a Data| {
            d.tenant_id == data.tenant_id
                && d.data_id == data.data_id
                && d.timestamp < data.timestamp
        };
        self.tick
            .iter()
            .rev()
            .find_map(|fact| match fact {
                Fact::Data(d) if earlier(&d) => Some(d),
                _ => None,
            })
            .or_else(|| {
                self.history
                    .get(&data.tenant_id, &data.data_id)
                    .filter(earlier)
            })
    }
}

// ── Compiled condition ─────────────────────────────────────────────

#[derive(Debug)]
enum Matcher {
    Plain,
    Regex(Regex),
    Expression(CompiledExpression),
}

/// A condition with its patterns and expression compiled once.
#[derive(Debug)]
pub struct CompiledCondition {
    condition: Condition,
    id: String,
    matcher: Matcher,
}

impl CompiledCondition {
    pub fn compile(condition: Condition) -> Result<Self, ConditionError> {
        condition.validate()?;
        let matcher = match &condition.kind {
            ConditionKind::StringMatch {
                operator: StringOperator::Match,
                pattern,
                ignore_case,
                ..
            } => Matcher::Regex(compile_full_match(pattern, *ignore_case).map_err(|e| {
                ConditionError::InvalidPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                }
            })?),
            ConditionKind::Event { expression, .. } => {
                Matcher::Expression(CompiledExpression::compile(expression))
            }
            _ => Matcher::Plain,
        };
        Ok(Self {
            id: condition.condition_id(),
            condition,
            matcher,
        })
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether `fact` is routed to this condition at all.
    pub fn applies_to(&self, fact: &Fact) -> bool {
        if *fact.tenant_id() != self.condition.tenant_id {
            return false;
        }
        match (&self.condition.kind, fact) {
            (ConditionKind::Event { data_id: Some(id), .. }, Fact::Event(e)) => {
                e.data_id.as_deref() == Some(id.as_str())
            }
            (ConditionKind::Event { data_id: None, .. }, Fact::Event(e)) => e
                .trigger_id
                .as_ref()
                .is_none_or(|t| *t == self.condition.trigger_id),
            (ConditionKind::Event { .. }, Fact::Data(_)) | (_, Fact::Event(_)) => false,
            (kind, Fact::Data(d)) => kind.data_ids().contains(&d.data_id.as_str()),
        }
    }

    /// Evaluate one fact. `Ok(None)` means the fact is not relevant to this
    /// condition (wrong id, wrong value type, or missing counterpart).
    pub fn evaluate(
        &self,
        fact: &Fact,
        ctx: &EvalContext<'_>,
    ) -> Result<Option<ConditionEval>, ConditionError> {
        if !self.applies_to(fact) {
            return Ok(None);
        }
        let outcome = match fact {
            Fact::Data(data) => self.evaluate_data(data, ctx)?,
            Fact::Event(event) => match &self.matcher {
                Matcher::Expression(expr) => Some((
                    expr.matches(event),
                    format!("event {}: {}", event.id, expr.source()),
                )),
                _ => None,
            },
        };

        Ok(outcome.map(|(matched, display)| ConditionEval {
            condition_id: self.id.clone(),
            condition_set_index: self.condition.condition_set_index,
            condition_type: self.condition.kind.type_name().to_string(),
            matched,
            eval_timestamp: fact.timestamp(),
            fact: fact.key(),
            display,
        }))
    }

    #[allow(clippy::too_many_lines)]
    fn evaluate_data(
        &self,
        data: &Data,
        ctx: &EvalContext<'_>,
    ) -> Result<Option<(bool, String)>, ConditionError> {
        let id = &data.data_id;
        let outcome = match &self.condition.kind {
            ConditionKind::Threshold {
                operator,
                threshold,
                ..
            } => numeric(data)?.map(|v| {
                (
                    operator.apply(v, *threshold),
                    format!("{id}: {v} {} {threshold}", operator.as_str()),
                )
            }),

            ConditionKind::ThresholdRange {
                operator_low,
                operator_high,
                threshold_low,
                threshold_high,
                in_range,
                ..
            } => numeric(data)?.map(|v| {
                let above_low = match operator_low {
                    RangeBound::Inclusive => v >= *threshold_low,
                    RangeBound::Exclusive => v > *threshold_low,
                };
                let below_high = match operator_high {
                    RangeBound::Inclusive => v <= *threshold_high,
                    RangeBound::Exclusive => v < *threshold_high,
                };
                let inside = above_low && below_high;
                let label = if *in_range { "in" } else { "out of" };
                (
                    inside == *in_range,
                    format!("{id}: {v} {label} [{threshold_low}, {threshold_high}]"),
                )
            }),

            ConditionKind::Availability { operator, .. } => match data.value {
                DataValue::Availability(state) => {
                    let matched = match operator {
                        AvailabilityOperator::Down => state == AvailabilityType::Down,
                        AvailabilityOperator::NotUp => state != AvailabilityType::Up,
                        AvailabilityOperator::Up => state == AvailabilityType::Up,
                    };
                    Some((matched, format!("{id}: {state:?} is {operator:?}")))
                }
                _ => None,
            },

            ConditionKind::Compare {
                data_id,
                operator,
                data2_id,
                data2_multiplier,
            } => {
                let (left, right) = if data.data_id == *data_id {
                    (Some(data), ctx.latest(&data.tenant_id, data2_id))
                } else {
                    (ctx.latest(&data.tenant_id, data_id), Some(data))
                };
                match (left, right) {
                    (Some(l), Some(r)) => match (numeric(l)?, numeric(r)?) {
                        (Some(lv), Some(rv)) => Some((
                            operator.apply(lv, data2_multiplier * rv),
                            format!(
                                "{data_id}: {lv} {} {data2_multiplier} * {data2_id}: {rv}",
                                operator.as_str()
                            ),
                        )),
                        _ => None,
                    },
                    _ => None,
                }
            }

            ConditionKind::StringMatch {
                operator,
                pattern,
                ignore_case,
                ..
            } => match &data.value {
                DataValue::String(value) => {
                    let matched = if let Matcher::Regex(re) = &self.matcher {
                        re.is_match(value)
                    } else {
                        string_match(*operator, value, pattern, *ignore_case)
                    };
                    Some((matched, format!("{id}: '{value}' {operator:?} '{pattern}'")))
                }
                _ => None,
            },

            ConditionKind::Rate {
                direction,
                period,
                operator,
                threshold,
                ..
            } => {
                let Some(prev) = ctx.previous(data) else {
                    return Ok(None);
                };
                match (numeric(data)?, numeric(prev)?) {
                    (Some(v), Some(pv)) => {
                        let elapsed = data.timestamp.saturating_sub(prev.timestamp);
                        rate(v - pv, elapsed, period.as_millis()).map(
                            |raw| {
                                let matched = match direction {
                                    RateDirection::Increasing => {
                                        raw >= 0.0 && operator.apply(raw, *threshold)
                                    }
                                    RateDirection::Decreasing => {
                                        raw <= 0.0 && operator.apply(-raw, *threshold)
                                    }
                                    RateDirection::Na => operator.apply(raw, *threshold),
                                };
                                (
                                    matched,
                                    format!(
                                        "{id}: rate {raw}/{period:?} {direction:?} {} {threshold}",
                                        operator.as_str()
                                    ),
                                )
                            },
                        )
                    }
                    _ => None,
                }
            }

            ConditionKind::Event { .. } => None,
        };
        Ok(outcome)
    }
}

fn numeric(data: &Data) -> Result<Option<f64>, ConditionError> {
    match data.value {
        DataValue::Numeric(v) if v.is_finite() => Ok(Some(v)),
        DataValue::Numeric(_) => Err(ConditionError::NonFiniteValue {
            data_id: data.data_id.clone(),
        }),
        _ => Ok(None),
    }
}

/// Change per `period_ms`. `None` when time does not move forward.
#[allow(clippy::cast_precision_loss)]
fn rate(delta: f64, elapsed_ms: i64, period_ms: i64) -> Option<f64> {
    if elapsed_ms <= 0 {
        return None;
    }
    Some(delta / elapsed_ms as f64 * period_ms as f64)
}

fn string_match(operator: StringOperator, value: &str, pattern: &str, ignore_case: bool) -> bool {
    let (value, pattern) = if ignore_case {
        (value.to_lowercase(), pattern.to_lowercase())
    } else {
        (value.to_string(), pattern.to_string())
    };
    match operator {
        StringOperator::Equal => value == pattern,
        StringOperator::NotEqual => value != pattern,
        StringOperator::StartsWith => value.starts_with(&pattern),
        StringOperator::EndsWith => value.ends_with(&pattern),
        StringOperator::Contains => value.contains(&pattern),
        // compiled into a regex matcher
        StringOperator::Match => false,
    }
}
