use crate::condition::entity::{ConditionEval, EvalSet};

/// Result of one tick for one condition set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Every index had at least one true eval.
    pub satisfied: bool,
    /// All true evals when satisfied, otherwise every eval seen this tick.
    pub eval_set: EvalSet,
    /// Latest fact timestamp among the evals.
    pub timestamp: i64,
}

/// Buffers the evals of one (trigger, mode) during a tick and decides, at the
/// end of the tick, whether they cover the whole condition set.
///
/// Nothing survives `finish_tick`: partial coverage is discarded.
#[derive(Debug, Clone)]
pub struct ConditionSetCorrelator {
    by_index: Vec<EvalSet>,
}

impl ConditionSetCorrelator {
    pub fn new(condition_set_size: usize) -> Self {
        Self {
            by_index: vec![EvalSet::new(); condition_set_size],
        }
    }

    pub fn condition_set_size(&self) -> usize {
        self.by_index.len()
    }

    /// Buffer an eval. Evals for indices outside the set are ignored.
    pub fn offer(&mut self, eval: ConditionEval) {
        if let Some(slot) = self.by_index.get_mut(eval.condition_set_index) {
            slot.insert(eval);
        }
    }

    /// Every index has at least one eval, true or false.
    pub fn is_complete(&self) -> bool {
        !self.by_index.is_empty() && self.by_index.iter().all(|s| !s.is_empty())
    }

    /// Every index has at least one true eval.
    pub fn is_satisfied(&self) -> bool {
        !self.by_index.is_empty() && self.by_index.iter().all(|s| s.iter().any(|e| e.matched))
    }

    /// Close the tick: emit an observation if the set was fully covered and
    /// reset the buffers either way.
    pub fn finish_tick(&mut self) -> Option<Observation> {
        let observation = if self.is_complete() {
            let satisfied = self.is_satisfied();
            let eval_set: EvalSet = self
                .by_index
                .iter()
                .flatten()
                .filter(|e| !satisfied || e.matched)
                .cloned()
                .collect();
            let timestamp = eval_set
                .iter()
                .map(|e| e.eval_timestamp)
                .max()
                .unwrap_or_default();
            Some(Observation {
                satisfied,
                eval_set,
                timestamp,
            })
        } else {
            None
        };
        self.reset();
        observation
    }

    pub fn reset(&mut self) {
        for slot in &mut self.by_index {
            slot.clear();
        }
    }
}
