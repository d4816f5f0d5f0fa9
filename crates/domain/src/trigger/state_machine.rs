//! Per-trigger runtime: compiled condition sets, correlation buffers and
//! dampening state for both modes, plus the FIRING/AUTORESOLVE transitions.

use super::entity::{Trigger, TriggerDefinition};
use super::error::TriggerError;
use crate::common::entity::Mode;
use crate::condition::entity::{Condition, EvalSet, validate_condition_set};
use crate::condition::evaluator::{CompiledCondition, DataHistory, EvalContext};
use crate::correlation::engine::ConditionSetCorrelator;
use crate::dampening::engine::{DampeningSnapshot, DampeningState};
use crate::dampening::entity::Dampening;
use crate::fact::entity::Fact;

/// A condition set of the trigger was satisfied past its dampening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerDecision {
    /// Mode whose condition set was satisfied.
    pub mode: Mode,
    pub eval_sets: Vec<EvalSet>,
    pub dampening: DampeningSnapshot,
    /// Mode the trigger is in after the decision.
    pub next_mode: Mode,
    /// The trigger disabled itself (`auto_disable`).
    pub auto_disabled: bool,
}

#[derive(Debug)]
struct ModeSlot {
    conditions: Vec<CompiledCondition>,
    correlator: ConditionSetCorrelator,
    dampening: DampeningState,
}

impl ModeSlot {
    fn build(
        trigger: &Trigger,
        mode: Mode,
        conditions: Vec<Condition>,
        dampening: Option<Dampening>,
    ) -> Result<Self, TriggerError> {
        let refs: Vec<&Condition> = conditions.iter().collect();
        validate_condition_set(mode, &refs)?;
        let size = conditions.first().map_or(0, |c| c.condition_set_size);

        let dampening = match dampening {
            Some(d) => {
                d.validate()?;
                d
            }
            None => Dampening::default_for(trigger.tenant_id.clone(), trigger.id.clone(), mode),
        };

        let conditions = conditions
            .into_iter()
            .map(CompiledCondition::compile)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            conditions,
            correlator: ConditionSetCorrelator::new(size),
            dampening: DampeningState::new(dampening),
        })
    }

    fn reset(&mut self) {
        self.correlator.reset();
        self.dampening.reset();
    }
}

/// Owns everything mutable about one trigger. Exactly one writer drives it.
#[derive(Debug)]
pub struct TriggerRuntime {
    trigger: Trigger,
    firing: ModeSlot,
    autoresolve: Option<ModeSlot>,
}

impl TriggerRuntime {
    /// Validate and compile a trigger definition.
    ///
    /// Conditions are split by their mode. A trigger needs at least one FIRING
    /// condition; AUTORESOLVE conditions are optional. Missing dampenings
    /// default to STRICT with a count of one.
    pub fn new(
        mut trigger: Trigger,
        conditions: Vec<Condition>,
        dampenings: Vec<Dampening>,
    ) -> Result<Self, TriggerError> {
        trigger.validate()?;

        for c in &conditions {
            if c.tenant_id != trigger.tenant_id || c.trigger_id != trigger.id {
                return Err(TriggerError::ForeignCondition {
                    condition_id: c.condition_id(),
                    reason: format!("expected {}/{}", trigger.tenant_id, trigger.id),
                });
            }
        }

        let mut firing_damp = None;
        let mut auto_damp = None;
        for d in dampenings {
            if d.tenant_id != trigger.tenant_id || d.trigger_id != trigger.id {
                return Err(TriggerError::InvalidDefinition(format!(
                    "dampening {} does not belong to trigger {}",
                    d.dampening_id(),
                    trigger.id
                )));
            }
            let slot = match d.trigger_mode {
                Mode::Firing => &mut firing_damp,
                Mode::Autoresolve => &mut auto_damp,
            };
            if slot.is_some() {
                return Err(TriggerError::DuplicateDampening(d.trigger_mode));
            }
            *slot = Some(d);
        }

        let (firing_conds, auto_conds): (Vec<_>, Vec<_>) = conditions
            .into_iter()
            .partition(|c| c.trigger_mode == Mode::Firing);

        if firing_conds.is_empty() {
            return Err(TriggerError::NoFiringConditions);
        }
        if auto_conds.is_empty() && auto_damp.is_some() {
            return Err(TriggerError::DampeningWithoutConditions(Mode::Autoresolve));
        }

        let firing = ModeSlot::build(&trigger, Mode::Firing, firing_conds, firing_damp)?;
        let autoresolve = if auto_conds.is_empty() {
            None
        } else {
            Some(ModeSlot::build(
                &trigger,
                Mode::Autoresolve,
                auto_conds,
                auto_damp,
            )?)
        };

        if autoresolve.is_none() {
            trigger.mode = Mode::Firing;
        }

        Ok(Self {
            trigger,
            firing,
            autoresolve,
        })
    }

    pub fn from_definition(definition: TriggerDefinition) -> Result<Self, TriggerError> {
        Self::new(
            definition.trigger,
            definition.conditions,
            definition.dampenings,
        )
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    pub fn mode(&self) -> Mode {
        self.trigger.mode
    }

    pub fn is_enabled(&self) -> bool {
        self.trigger.enabled
    }

    pub fn has_autoresolve(&self) -> bool {
        self.autoresolve.is_some()
    }

    /// All conditions of both modes, FIRING first.
    pub fn conditions(&self) -> impl Iterator<Item = &Condition> {
        self.firing
            .conditions
            .iter()
            .chain(self.autoresolve.iter().flat_map(|s| s.conditions.iter()))
            .map(CompiledCondition::condition)
    }

    pub fn dampening(&self, mode: Mode) -> Option<&Dampening> {
        match mode {
            Mode::Firing => Some(self.firing.dampening.dampening()),
            Mode::Autoresolve => self.autoresolve.as_ref().map(|s| s.dampening.dampening()),
        }
    }

    fn slot_mut(&mut self, mode: Mode) -> &mut ModeSlot {
        match (mode, self.autoresolve.as_mut()) {
            (Mode::Autoresolve, Some(slot)) => slot,
            _ => &mut self.firing,
        }
    }

    /// Evaluate one tick of facts (sorted by [`crate::fact::entity::sort_facts`])
    /// against the conditions of the current mode.
    ///
    /// Disabled triggers ignore the tick. On error the tick's partial
    /// correlation is discarded and dampening is left untouched.
    pub fn evaluate_tick(
        &mut self,
        tick: &[Fact],
        history: &DataHistory,
    ) -> Result<Option<TriggerDecision>, TriggerError> {
        if !self.trigger.enabled {
            return Ok(None);
        }
        let mode = self.trigger.mode;
        let ctx = EvalContext::new(tick, history);
        let slot = self.slot_mut(mode);

        for fact in tick {
            for condition in &slot.conditions {
                match condition.evaluate(fact, &ctx) {
                    Ok(Some(eval)) => slot.correlator.offer(eval),
                    Ok(None) => {}
                    Err(e) => {
                        slot.correlator.reset();
                        return Err(e.into());
                    }
                }
            }
        }

        let Some(observation) = slot.correlator.finish_tick() else {
            return Ok(None);
        };
        let Some(decision) = slot.dampening.perform(observation) else {
            return Ok(None);
        };

        let next_mode = match mode {
            Mode::Firing if self.autoresolve.is_some() => Mode::Autoresolve,
            Mode::Firing | Mode::Autoresolve => Mode::Firing,
        };
        self.switch_mode(next_mode);

        let auto_disabled = mode == Mode::Firing && self.trigger.auto_disable;
        if auto_disabled {
            self.trigger.enabled = false;
            self.reset();
        }

        Ok(Some(TriggerDecision {
            mode,
            eval_sets: decision.eval_sets,
            dampening: decision.snapshot,
            next_mode,
            auto_disabled,
        }))
    }

    fn switch_mode(&mut self, mode: Mode) {
        if self.trigger.mode != mode {
            self.trigger.mode = mode;
            self.slot_mut(mode).reset();
        }
    }

    /// Discard all correlation and dampening progress of both modes.
    pub fn reset(&mut self) {
        self.firing.reset();
        if let Some(slot) = self.autoresolve.as_mut() {
            slot.reset();
        }
    }

    /// Re-arm in FIRING mode with clean state.
    pub fn enable(&mut self) {
        self.trigger.enabled = true;
        self.trigger.mode = Mode::Firing;
        self.reset();
    }

    /// Suspend evaluation and drop accumulated state.
    pub fn disable(&mut self) {
        self.trigger.enabled = false;
        self.reset();
    }

    /// Return to FIRING with clean state, e.g. after the last open alert was
    /// resolved by hand.
    pub fn return_to_firing(&mut self) {
        self.trigger.mode = Mode::Firing;
        self.reset();
    }

    /// Go back to waiting in AUTORESOLVE with clean state, for when the
    /// alerts an autoresolve decision should have closed could not be read.
    pub fn hold_autoresolve(&mut self) {
        if self.autoresolve.is_some() && self.trigger.enabled {
            self.trigger.mode = Mode::Autoresolve;
            self.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::entity::{TenantId, TriggerId};
    use crate::condition::entity::{AvailabilityOperator, CompareOperator, ConditionKind};
    use crate::fact::entity::{AvailabilityType, Data, DataValue, Event};

    fn tenant() -> TenantId {
        TenantId("tenant".to_string())
    }

    fn trigger_id() -> TriggerId {
        TriggerId("trigger-1".to_string())
    }

    fn make_trigger() -> Trigger {
        Trigger::new(tenant(), trigger_id(), "test")
    }

    fn make_condition(mode: Mode, size: usize, index: usize, kind: ConditionKind) -> Condition {
        Condition {
            tenant_id: tenant(),
            trigger_id: trigger_id(),
            trigger_mode: mode,
            condition_set_size: size,
            condition_set_index: index,
            kind,
        }
    }

    fn threshold(data_id: &str, operator: CompareOperator, threshold: f64) -> ConditionKind {
        ConditionKind::Threshold {
            data_id: data_id.to_string(),
            operator,
            threshold,
        }
    }

    fn numeric(data_id: &str, ts: i64, v: f64) -> Fact {
        Fact::Data(Data {
            tenant_id: tenant(),
            data_id: data_id.to_string(),
            timestamp: ts,
            value: DataValue::Numeric(v),
        })
    }

    fn avail(data_id: &str, ts: i64, state: AvailabilityType) -> Fact {
        Fact::Data(Data {
            tenant_id: tenant(),
            data_id: data_id.to_string(),
            timestamp: ts,
            value: DataValue::Availability(state),
        })
    }

    /// FIRING `X > 1000`, AUTORESOLVE `X <= 1000`, default dampening.
    fn make_threshold_runtime() -> TriggerRuntime {
        TriggerRuntime::new(
            make_trigger(),
            vec![
                make_condition(Mode::Firing, 1, 0, threshold("X", CompareOperator::Gt, 1000.0)),
                make_condition(
                    Mode::Autoresolve,
                    1,
                    0,
                    threshold("X", CompareOperator::Lte, 1000.0),
                ),
            ],
            Vec::new(),
        )
        .unwrap()
    }

    fn tick(rt: &mut TriggerRuntime, facts: &[Fact]) -> Option<TriggerDecision> {
        rt.evaluate_tick(facts, &DataHistory::new()).unwrap()
    }

    // ── Construction ──────────────────────────────────────────────

    #[test]
    fn requires_firing_conditions() {
        let err = TriggerRuntime::new(
            make_trigger(),
            vec![make_condition(
                Mode::Autoresolve,
                1,
                0,
                threshold("X", CompareOperator::Lte, 1.0),
            )],
            Vec::new(),
        )
        .unwrap_err();
        assert_eq!(err, TriggerError::NoFiringConditions);
    }

    #[test]
    fn rejects_incomplete_set() {
        let err = TriggerRuntime::new(
            make_trigger(),
            vec![make_condition(
                Mode::Firing,
                2,
                0,
                threshold("X", CompareOperator::Gt, 1.0),
            )],
            Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, TriggerError::Condition(_)));
    }

    #[test]
    fn rejects_foreign_condition() {
        let mut c = make_condition(Mode::Firing, 1, 0, threshold("X", CompareOperator::Gt, 1.0));
        c.trigger_id = TriggerId("other".to_string());
        let err = TriggerRuntime::new(make_trigger(), vec![c], Vec::new()).unwrap_err();
        assert!(matches!(err, TriggerError::ForeignCondition { .. }));
    }

    #[test]
    fn rejects_duplicate_dampening() {
        let d = Dampening::for_strict(tenant(), trigger_id(), Mode::Firing, 2).unwrap();
        let err = TriggerRuntime::new(
            make_trigger(),
            vec![make_condition(Mode::Firing, 1, 0, threshold("X", CompareOperator::Gt, 1.0))],
            vec![d.clone(), d],
        )
        .unwrap_err();
        assert_eq!(err, TriggerError::DuplicateDampening(Mode::Firing));
    }

    #[test]
    fn default_dampening_is_strict_one() {
        let rt = make_threshold_runtime();
        assert_eq!(rt.dampening(Mode::Firing).unwrap().eval_true_setting, 1);
        assert!(rt.has_autoresolve());
        assert_eq!(rt.conditions().count(), 2);
    }

    // ── Mode transitions ──────────────────────────────────────────

    #[test]
    fn firing_then_autoresolve_cycle() {
        let mut rt = make_threshold_runtime();

        let d = tick(&mut rt, &[numeric("X", 1, 1001.0)]).unwrap();
        assert_eq!(d.mode, Mode::Firing);
        assert_eq!(d.next_mode, Mode::Autoresolve);
        assert_eq!(rt.mode(), Mode::Autoresolve);

        // still high: the AUTORESOLVE set is evaluated and misses
        assert!(tick(&mut rt, &[numeric("X", 2, 1005.0)]).is_none());

        let d = tick(&mut rt, &[numeric("X", 3, 998.0)]).unwrap();
        assert_eq!(d.mode, Mode::Autoresolve);
        assert_eq!(d.next_mode, Mode::Firing);
        let eval = d.eval_sets[0].iter().next().unwrap();
        assert_eq!(eval.condition_id, "trigger-1-AUTORESOLVE-1-0");
        assert_eq!(rt.mode(), Mode::Firing);
    }

    #[test]
    fn without_autoresolve_stays_firing() {
        let mut rt = TriggerRuntime::new(
            make_trigger(),
            vec![make_condition(Mode::Firing, 1, 0, threshold("X", CompareOperator::Gt, 1000.0))],
            Vec::new(),
        )
        .unwrap();
        assert!(tick(&mut rt, &[numeric("X", 1, 1001.0)]).is_some());
        assert_eq!(rt.mode(), Mode::Firing);
        assert!(tick(&mut rt, &[numeric("X", 2, 1002.0)]).is_some());
    }

    #[test]
    fn mixed_condition_set_needs_both_facts() {
        let mut rt = TriggerRuntime::new(
            make_trigger(),
            vec![
                make_condition(Mode::Firing, 2, 0, threshold("A", CompareOperator::Gt, 1000.0)),
                make_condition(
                    Mode::Firing,
                    2,
                    1,
                    ConditionKind::Availability {
                        data_id: "B".to_string(),
                        operator: AvailabilityOperator::NotUp,
                    },
                ),
            ],
            Vec::new(),
        )
        .unwrap();

        for ts in 1..5 {
            assert!(tick(&mut rt, &[numeric("A", ts, 1003.0)]).is_none());
        }
        let d = tick(
            &mut rt,
            &[numeric("A", 10, 1003.0), avail("B", 10, AvailabilityType::Down)],
        )
        .unwrap();
        assert_eq!(d.eval_sets[0].len(), 2);
    }

    #[test]
    fn strict_dampening_counts_ticks() {
        let d = Dampening::for_strict(tenant(), trigger_id(), Mode::Firing, 3).unwrap();
        let mut rt = TriggerRuntime::new(
            make_trigger(),
            vec![make_condition(Mode::Firing, 1, 0, threshold("X", CompareOperator::Gt, 10.0))],
            vec![d],
        )
        .unwrap();
        assert!(tick(&mut rt, &[numeric("X", 1, 11.0)]).is_none());
        assert!(tick(&mut rt, &[numeric("X", 2, 11.0)]).is_none());
        assert!(tick(&mut rt, &[numeric("X", 3, 9.0)]).is_none());
        assert!(tick(&mut rt, &[numeric("X", 4, 11.0)]).is_none());
        assert!(tick(&mut rt, &[numeric("X", 5, 11.0)]).is_none());
        assert_eq!(tick(&mut rt, &[numeric("X", 6, 11.0)]).unwrap().eval_sets.len(), 3);
    }

    // ── Enable / disable ──────────────────────────────────────────

    #[test]
    fn disabled_trigger_ignores_facts() {
        let mut rt = make_threshold_runtime();
        rt.disable();
        assert!(tick(&mut rt, &[numeric("X", 1, 2000.0)]).is_none());
        assert_eq!(rt.mode(), Mode::Firing);
    }

    #[test]
    fn disable_clears_dampening() {
        let d = Dampening::for_strict(tenant(), trigger_id(), Mode::Firing, 2).unwrap();
        let mut rt = TriggerRuntime::new(
            make_trigger(),
            vec![make_condition(Mode::Firing, 1, 0, threshold("X", CompareOperator::Gt, 10.0))],
            vec![d],
        )
        .unwrap();
        assert!(tick(&mut rt, &[numeric("X", 1, 11.0)]).is_none());
        rt.disable();
        rt.enable();
        assert!(tick(&mut rt, &[numeric("X", 2, 11.0)]).is_none());
        assert!(tick(&mut rt, &[numeric("X", 3, 11.0)]).is_some());
    }

    #[test]
    fn enable_resets_to_firing() {
        let mut rt = make_threshold_runtime();
        tick(&mut rt, &[numeric("X", 1, 1001.0)]).unwrap();
        assert_eq!(rt.mode(), Mode::Autoresolve);
        rt.disable();
        rt.enable();
        assert_eq!(rt.mode(), Mode::Firing);
    }

    #[test]
    fn auto_disable_after_firing() {
        let mut trigger = make_trigger();
        trigger.auto_disable = true;
        let mut rt = TriggerRuntime::new(
            trigger,
            vec![make_condition(Mode::Firing, 1, 0, threshold("X", CompareOperator::Gt, 10.0))],
            Vec::new(),
        )
        .unwrap();
        let d = tick(&mut rt, &[numeric("X", 1, 11.0)]).unwrap();
        assert!(d.auto_disabled);
        assert!(!rt.is_enabled());
        assert!(tick(&mut rt, &[numeric("X", 2, 11.0)]).is_none());
    }

    #[test]
    fn hold_autoresolve_waits_again() {
        let mut rt = make_threshold_runtime();
        tick(&mut rt, &[numeric("X", 1, 1001.0)]).unwrap();
        let d = tick(&mut rt, &[numeric("X", 2, 5.0)]).unwrap();
        assert_eq!(d.next_mode, Mode::Firing);

        rt.hold_autoresolve();
        assert_eq!(rt.mode(), Mode::Autoresolve);
        assert!(tick(&mut rt, &[numeric("X", 3, 1001.0)]).is_none());
    }

    #[test]
    fn return_to_firing_rearms() {
        let mut rt = make_threshold_runtime();
        tick(&mut rt, &[numeric("X", 1, 1001.0)]).unwrap();
        rt.return_to_firing();
        assert_eq!(rt.mode(), Mode::Firing);
        assert!(tick(&mut rt, &[numeric("X", 2, 1001.0)]).is_some());
    }

    // ── Faults ────────────────────────────────────────────────────

    #[test]
    fn non_finite_value_is_an_error() {
        let mut rt = make_threshold_runtime();
        let result = rt.evaluate_tick(&[numeric("X", 1, f64::NAN)], &DataHistory::new());
        assert!(result.is_err());
        // the next tick is evaluated normally
        assert!(tick(&mut rt, &[numeric("X", 2, 1001.0)]).is_some());
    }

    #[test]
    fn event_condition_fires_on_matching_event() {
        let mut rt = TriggerRuntime::new(
            make_trigger(),
            vec![make_condition(
                Mode::Firing,
                1,
                0,
                ConditionKind::Event {
                    data_id: None,
                    expression: "context.category == 'Server'".to_string(),
                },
            )],
            Vec::new(),
        )
        .unwrap();
        let mut event = Event {
            tenant_id: tenant(),
            id: "e1".to_string(),
            ctime: 5,
            ..Event::default()
        };
        assert!(tick(&mut rt, &[Fact::Event(event.clone())]).is_none());
        event
            .context
            .insert("category".to_string(), "Server".to_string());
        assert!(tick(&mut rt, &[Fact::Event(event)]).is_some());
    }
}
