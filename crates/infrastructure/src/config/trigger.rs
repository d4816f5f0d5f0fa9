//! Trigger, condition and dampening configuration structs and conversion logic.

use std::collections::BTreeMap;

use domain::common::entity::{Mode, TenantId, TriggerId};
use domain::condition::entity::{CompareOperator, Condition, ConditionKind, StringOperator};
use domain::dampening::entity::{Dampening, DampeningStrategy};
use domain::expression::matcher;
use domain::trigger::entity::{Trigger, TriggerAction, TriggerDefinition};
use domain::trigger::state_machine::TriggerRuntime;
use serde::{Deserialize, Serialize};

use super::common::{
    ConfigError, MAX_BINDINGS_PER_TRIGGER, MAX_CONDITIONS_PER_TRIGGER, check_limit, default_mode,
    default_true, invalid, parse_alert_status, parse_availability_operator,
    parse_compare_operator, parse_dampening_strategy, parse_mode, parse_range_bound,
    parse_rate_direction, parse_rate_period, parse_severity, parse_string_operator,
    require_non_empty, validate_regex,
};

const SEVERITIES: &str = "low, medium, high, critical";
const MODES: &str = "firing, autoresolve";

fn default_severity() -> String {
    "medium".to_string()
}

fn default_multiplier() -> f64 {
    1.0
}

fn default_tenant() -> String {
    "default".to_string()
}

// ── Trigger ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(default = "default_tenant")]
    pub tenant_id: String,

    pub id: String,

    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default = "default_severity")]
    pub severity: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub auto_disable: bool,

    #[serde(default = "default_true")]
    pub auto_resolve_alerts: bool,

    #[serde(default)]
    pub context: BTreeMap<String, String>,

    #[serde(default)]
    pub actions: Vec<ActionBindingConfig>,

    pub conditions: Vec<ConditionConfig>,

    #[serde(default)]
    pub dampening: Vec<DampeningConfig>,
}

/// Binds a trigger to a configured action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionBindingConfig {
    pub plugin: String,
    pub action_id: String,
    /// Alert statuses that notify (`open`, `acknowledged`, `resolved`).
    /// Empty means every status.
    #[serde(default)]
    pub states: Vec<String>,
}

impl TriggerConfig {
    pub(super) fn validate(&self, idx: usize) -> Result<(), ConfigError> {
        let prefix = format!("triggers[{idx}]");

        require_non_empty(&format!("{prefix}.tenant_id"), &self.tenant_id)?;
        require_non_empty(&format!("{prefix}.id"), &self.id)?;
        require_non_empty(&format!("{prefix}.name"), &self.name)?;
        check_limit(
            &format!("{prefix}.conditions"),
            self.conditions.len(),
            MAX_CONDITIONS_PER_TRIGGER,
        )?;
        check_limit(
            &format!("{prefix}.actions"),
            self.actions.len(),
            MAX_BINDINGS_PER_TRIGGER,
        )?;

        parse_severity(&self.severity)
            .map_err(|()| invalid(&format!("{prefix}.severity"), &self.severity, SEVERITIES))?;

        for (j, condition) in self.conditions.iter().enumerate() {
            condition.validate(&format!("{prefix}.conditions[{j}]"))?;
        }
        for (k, dampening) in self.dampening.iter().enumerate() {
            dampening.to_domain(&self.tenant_id, &self.id, &format!("{prefix}.dampening[{k}]"))?;
        }
        for (b, binding) in self.actions.iter().enumerate() {
            binding.to_domain(&format!("{prefix}.actions[{b}]"))?;
        }

        // Whole-definition invariants: ids, complete condition sets,
        // dampening per mode.
        TriggerRuntime::from_definition(self.build(&prefix)?).map_err(|e| {
            ConfigError::Validation {
                field: prefix.clone(),
                message: e.to_string(),
            }
        })?;
        Ok(())
    }

    fn label(&self) -> String {
        format!("triggers[{}]", self.id)
    }

    pub fn to_domain_trigger(&self) -> Result<Trigger, ConfigError> {
        self.trigger(&self.label())
    }

    /// Conditions numbered per mode in declaration order.
    pub fn to_domain_conditions(&self) -> Result<Vec<Condition>, ConfigError> {
        self.conditions_with(&self.label())
    }

    pub fn to_domain_dampening(&self) -> Result<Vec<Dampening>, ConfigError> {
        let prefix = self.label();
        self.dampening
            .iter()
            .enumerate()
            .map(|(k, d)| d.to_domain(&self.tenant_id, &self.id, &format!("{prefix}.dampening[{k}]")))
            .collect()
    }

    pub fn to_domain_definition(&self) -> Result<TriggerDefinition, ConfigError> {
        self.build(&self.label())
    }

    fn build(&self, prefix: &str) -> Result<TriggerDefinition, ConfigError> {
        Ok(TriggerDefinition {
            trigger: self.trigger(prefix)?,
            conditions: self.conditions_with(prefix)?,
            dampenings: self
                .dampening
                .iter()
                .enumerate()
                .map(|(k, d)| d.to_domain(&self.tenant_id, &self.id, &format!("{prefix}.dampening[{k}]")))
                .collect::<Result<_, _>>()?,
        })
    }

    fn trigger(&self, prefix: &str) -> Result<Trigger, ConfigError> {
        let mut trigger = Trigger::new(
            TenantId(self.tenant_id.clone()),
            TriggerId(self.id.clone()),
            self.name.clone(),
        );
        trigger.description.clone_from(&self.description);
        trigger.severity = parse_severity(&self.severity)
            .map_err(|()| invalid(&format!("{prefix}.severity"), &self.severity, SEVERITIES))?;
        trigger.enabled = self.enabled;
        trigger.auto_disable = self.auto_disable;
        trigger.auto_resolve_alerts = self.auto_resolve_alerts;
        trigger.context.clone_from(&self.context);
        trigger.actions = self
            .actions
            .iter()
            .enumerate()
            .map(|(b, binding)| binding.to_domain(&format!("{prefix}.actions[{b}]")))
            .collect::<Result<_, _>>()?;
        Ok(trigger)
    }

    fn conditions_with(&self, prefix: &str) -> Result<Vec<Condition>, ConfigError> {
        let mut modes = Vec::with_capacity(self.conditions.len());
        for (j, c) in self.conditions.iter().enumerate() {
            modes.push(
                parse_mode(&c.mode)
                    .map_err(|()| invalid(&format!("{prefix}.conditions[{j}].mode"), &c.mode, MODES))?,
            );
        }
        let size_of = |mode: Mode| modes.iter().filter(|m| **m == mode).count();
        let (firing_size, autoresolve_size) = (size_of(Mode::Firing), size_of(Mode::Autoresolve));

        let mut next_index = [0usize; 2];
        let mut out = Vec::with_capacity(self.conditions.len());
        for (j, (c, mode)) in self.conditions.iter().zip(modes).enumerate() {
            let (slot, size) = match mode {
                Mode::Firing => (0, firing_size),
                Mode::Autoresolve => (1, autoresolve_size),
            };
            out.push(Condition {
                tenant_id: TenantId(self.tenant_id.clone()),
                trigger_id: TriggerId(self.id.clone()),
                trigger_mode: mode,
                condition_set_size: size,
                condition_set_index: next_index[slot],
                kind: c.to_domain_kind(&format!("{prefix}.conditions[{j}]"))?,
            });
            next_index[slot] += 1;
        }
        Ok(out)
    }
}

impl ActionBindingConfig {
    fn to_domain(&self, prefix: &str) -> Result<TriggerAction, ConfigError> {
        require_non_empty(&format!("{prefix}.plugin"), &self.plugin)?;
        require_non_empty(&format!("{prefix}.action_id"), &self.action_id)?;
        let states = self
            .states
            .iter()
            .map(|s| {
                parse_alert_status(s).map_err(|()| {
                    invalid(&format!("{prefix}.states"), s, "open, acknowledged, resolved")
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(TriggerAction {
            action_plugin: self.plugin.clone(),
            action_id: self.action_id.clone(),
            states,
        })
    }
}

// ── Condition ──────────────────────────────────────────────────────

/// One condition, flattened across kinds. Which fields are required
/// depends on `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionConfig {
    #[serde(default = "default_mode")]
    pub mode: String,

    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub data_id: Option<String>,

    #[serde(default)]
    pub operator: Option<String>,

    #[serde(default)]
    pub threshold: Option<f64>,

    // threshold_range
    #[serde(default)]
    pub operator_low: Option<String>,
    #[serde(default)]
    pub operator_high: Option<String>,
    #[serde(default)]
    pub threshold_low: Option<f64>,
    #[serde(default)]
    pub threshold_high: Option<f64>,
    #[serde(default = "default_true")]
    pub in_range: bool,

    // compare
    #[serde(default)]
    pub data2_id: Option<String>,
    #[serde(default = "default_multiplier")]
    pub data2_multiplier: f64,

    // string
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub ignore_case: bool,

    // rate
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub period: Option<String>,

    // event
    #[serde(default)]
    pub expression: Option<String>,
}

fn required<'a, T>(prefix: &str, name: &str, value: Option<&'a T>) -> Result<&'a T, ConfigError>
where
    T: ?Sized,
{
    value.ok_or_else(|| ConfigError::Validation {
        field: format!("{prefix}.{name}"),
        message: "required for this condition type".to_string(),
    })
}

impl ConditionConfig {
    /// Kind-level checks plus the expression and regex passes.
    pub(super) fn validate(&self, prefix: &str) -> Result<(), ConfigError> {
        parse_mode(&self.mode).map_err(|()| invalid(&format!("{prefix}.mode"), &self.mode, MODES))?;

        match self.to_domain_kind(prefix)? {
            ConditionKind::Event { expression, .. } => {
                matcher::validate(&expression).map_err(|e| ConfigError::Validation {
                    field: format!("{prefix}.expression"),
                    message: e.to_string(),
                })?;
            }
            ConditionKind::StringMatch {
                operator: StringOperator::Match,
                pattern,
                ..
            } => validate_regex(&pattern, &format!("{prefix}.pattern"))?,
            _ => {}
        }
        Ok(())
    }

    fn data_id(&self, prefix: &str) -> Result<String, ConfigError> {
        let id = required(prefix, "data_id", self.data_id.as_deref())?;
        require_non_empty(&format!("{prefix}.data_id"), id)?;
        Ok(id.to_string())
    }

    fn compare_operator(&self, prefix: &str) -> Result<CompareOperator, ConfigError> {
        let op = required(prefix, "operator", self.operator.as_deref())?;
        parse_compare_operator(op)
            .map_err(|()| invalid(&format!("{prefix}.operator"), op, "lt, lte, gt, gte, eq, ne"))
    }

    #[allow(clippy::too_many_lines)]
    pub fn to_domain_kind(&self, prefix: &str) -> Result<ConditionKind, ConfigError> {
        let kind = self.kind.trim().to_lowercase().replace('-', "_");
        match kind.as_str() {
            "threshold" => Ok(ConditionKind::Threshold {
                data_id: self.data_id(prefix)?,
                operator: self.compare_operator(prefix)?,
                threshold: *required(prefix, "threshold", self.threshold.as_ref())?,
            }),
            "threshold_range" | "range" => {
                let bound = |name: &str, value: Option<&String>| {
                    let v = required(prefix, name, value.map(String::as_str))?;
                    parse_range_bound(v)
                        .map_err(|()| invalid(&format!("{prefix}.{name}"), v, "inclusive, exclusive"))
                };
                Ok(ConditionKind::ThresholdRange {
                    data_id: self.data_id(prefix)?,
                    operator_low: bound("operator_low", self.operator_low.as_ref())?,
                    operator_high: bound("operator_high", self.operator_high.as_ref())?,
                    threshold_low: *required(prefix, "threshold_low", self.threshold_low.as_ref())?,
                    threshold_high: *required(prefix, "threshold_high", self.threshold_high.as_ref())?,
                    in_range: self.in_range,
                })
            }
            "availability" => {
                let op = required(prefix, "operator", self.operator.as_deref())?;
                Ok(ConditionKind::Availability {
                    data_id: self.data_id(prefix)?,
                    operator: parse_availability_operator(op)
                        .map_err(|()| invalid(&format!("{prefix}.operator"), op, "down, not_up, up"))?,
                })
            }
            "compare" => {
                let data2 = required(prefix, "data2_id", self.data2_id.as_deref())?;
                require_non_empty(&format!("{prefix}.data2_id"), data2)?;
                Ok(ConditionKind::Compare {
                    data_id: self.data_id(prefix)?,
                    operator: self.compare_operator(prefix)?,
                    data2_id: data2.to_string(),
                    data2_multiplier: self.data2_multiplier,
                })
            }
            "string" => {
                let op = required(prefix, "operator", self.operator.as_deref())?;
                Ok(ConditionKind::StringMatch {
                    data_id: self.data_id(prefix)?,
                    operator: parse_string_operator(op).map_err(|()| {
                        invalid(
                            &format!("{prefix}.operator"),
                            op,
                            "equal, not_equal, starts_with, ends_with, contains, match",
                        )
                    })?,
                    pattern: required(prefix, "pattern", self.pattern.as_ref())?.clone(),
                    ignore_case: self.ignore_case,
                })
            }
            "rate" => {
                let direction = required(prefix, "direction", self.direction.as_deref())?;
                let period = required(prefix, "period", self.period.as_deref())?;
                Ok(ConditionKind::Rate {
                    data_id: self.data_id(prefix)?,
                    direction: parse_rate_direction(direction).map_err(|()| {
                        invalid(&format!("{prefix}.direction"), direction, "increasing, decreasing, na")
                    })?,
                    period: parse_rate_period(period).map_err(|()| {
                        invalid(&format!("{prefix}.period"), period, "second, minute, hour, day")
                    })?,
                    operator: self.compare_operator(prefix)?,
                    threshold: *required(prefix, "threshold", self.threshold.as_ref())?,
                })
            }
            "event" => Ok(ConditionKind::Event {
                data_id: self.data_id.clone().filter(|d| !d.is_empty()),
                expression: required(prefix, "expression", self.expression.as_ref())?.clone(),
            }),
            _ => Err(invalid(
                &format!("{prefix}.type"),
                &self.kind,
                "threshold, threshold_range, availability, compare, string, rate, event",
            )),
        }
    }
}

// ── Dampening ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DampeningConfig {
    #[serde(default = "default_mode")]
    pub mode: String,

    #[serde(rename = "type")]
    pub strategy: String,

    /// Required true evaluations (`strict`, `relaxed_count`, `relaxed_time`).
    #[serde(default)]
    pub eval_true: Option<u32>,

    /// Window size in evaluations (`relaxed_count`).
    #[serde(default)]
    pub eval_total: Option<u32>,

    /// Period in milliseconds (`strict_time*`, `relaxed_time`).
    #[serde(default)]
    pub eval_time_ms: Option<i64>,
}

impl DampeningConfig {
    pub fn to_domain(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        prefix: &str,
    ) -> Result<Dampening, ConfigError> {
        let mode = parse_mode(&self.mode)
            .map_err(|()| invalid(&format!("{prefix}.mode"), &self.mode, MODES))?;
        let strategy = parse_dampening_strategy(&self.strategy).map_err(|()| {
            invalid(
                &format!("{prefix}.type"),
                &self.strategy,
                "strict, strict_time, strict_time_autoresolve, relaxed_count, relaxed_time",
            )
        })?;
        let tenant = TenantId(tenant_id.to_string());
        let trigger = TriggerId(trigger_id.to_string());
        let eval_true = || required(prefix, "eval_true", self.eval_true.as_ref()).copied();
        let eval_time = || required(prefix, "eval_time_ms", self.eval_time_ms.as_ref()).copied();

        let built = match strategy {
            DampeningStrategy::Strict => Dampening::for_strict(tenant, trigger, mode, eval_true()?),
            DampeningStrategy::StrictTime => {
                Dampening::for_strict_time(tenant, trigger, mode, eval_time()?)
            }
            DampeningStrategy::StrictTimeAutoresolve => {
                if mode != Mode::Autoresolve {
                    return Err(ConfigError::Validation {
                        field: format!("{prefix}.mode"),
                        message: "strict_time_autoresolve applies to autoresolve only".to_string(),
                    });
                }
                Dampening::for_strict_time_autoresolve(tenant, trigger, eval_time()?)
            }
            DampeningStrategy::RelaxedCount => Dampening::for_relaxed_count(
                tenant,
                trigger,
                mode,
                eval_true()?,
                *required(prefix, "eval_total", self.eval_total.as_ref())?,
            ),
            DampeningStrategy::RelaxedTime => {
                Dampening::for_relaxed_time(tenant, trigger, mode, eval_true()?, eval_time()?)
            }
        };
        built.map_err(|e| ConfigError::Validation {
            field: prefix.to_string(),
            message: e.to_string(),
        })
    }
}
