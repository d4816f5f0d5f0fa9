use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::entity::{Dampening, DampeningStrategy};
use crate::condition::entity::EvalSet;
use crate::correlation::engine::Observation;

/// Dampening counters at the moment a decision was taken, kept on the alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DampeningSnapshot {
    #[serde(flatten)]
    pub dampening: Dampening,
    pub num_true_evals: u32,
    pub num_evals: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub true_evals_start_time: Option<i64>,
    pub satisfied_at: i64,
}

/// The condition set of a (trigger, mode) has been satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DampeningDecision {
    /// Eval-sets that contributed, oldest first.
    pub eval_sets: Vec<EvalSet>,
    pub snapshot: DampeningSnapshot,
}

/// Accumulated state for one [`Dampening`]. Single writer: the owning
/// trigger runtime.
#[derive(Debug, Clone)]
pub struct DampeningState {
    dampening: Dampening,
    num_true_evals: u32,
    num_evals: u32,
    true_evals_start_time: Option<i64>,
    /// Satisfying eval-sets since the last reset (STRICT, STRICT_TIME).
    satisfying: Vec<EvalSet>,
    /// Recent observations, `None` for misses (RELAXED_COUNT), or
    /// timestamped satisfied sets (RELAXED_TIME).
    window: VecDeque<(i64, Option<EvalSet>)>,
}

impl DampeningState {
    pub fn new(dampening: Dampening) -> Self {
        Self {
            dampening,
            num_true_evals: 0,
            num_evals: 0,
            true_evals_start_time: None,
            satisfying: Vec::new(),
            window: VecDeque::new(),
        }
    }

    pub fn dampening(&self) -> &Dampening {
        &self.dampening
    }

    pub fn num_true_evals(&self) -> u32 {
        self.num_true_evals
    }

    pub fn num_evals(&self) -> u32 {
        self.num_evals
    }

    /// Drop all accumulated observations.
    pub fn reset(&mut self) {
        self.num_true_evals = 0;
        self.num_evals = 0;
        self.true_evals_start_time = None;
        self.satisfying.clear();
        self.window.clear();
    }

    /// Feed one observation. Returns a decision when the strategy is
    /// satisfied; the state is reset in that case.
    pub fn perform(&mut self, observation: Observation) -> Option<DampeningDecision> {
        self.num_evals = self.num_evals.saturating_add(1);
        let satisfied = match self.dampening.strategy {
            DampeningStrategy::Strict => self.perform_strict(observation),
            DampeningStrategy::StrictTime | DampeningStrategy::StrictTimeAutoresolve => {
                self.perform_strict_time(observation)
            }
            DampeningStrategy::RelaxedCount => self.perform_relaxed_count(observation),
            DampeningStrategy::RelaxedTime => self.perform_relaxed_time(observation),
        }?;
        Some(self.decide(satisfied))
    }

    fn perform_strict(&mut self, obs: Observation) -> Option<i64> {
        if !obs.satisfied {
            self.reset();
            return None;
        }
        self.num_true_evals += 1;
        self.satisfying.push(obs.eval_set);
        (self.num_true_evals >= self.dampening.eval_true_setting).then_some(obs.timestamp)
    }

    fn perform_strict_time(&mut self, obs: Observation) -> Option<i64> {
        if !obs.satisfied {
            self.reset();
            return None;
        }
        self.num_true_evals += 1;
        self.satisfying.push(obs.eval_set);
        let start = *self.true_evals_start_time.get_or_insert(obs.timestamp);
        let elapsed = obs.timestamp.saturating_sub(start);
        (elapsed >= self.dampening.eval_time_setting).then_some(obs.timestamp)
    }

    fn perform_relaxed_count(&mut self, obs: Observation) -> Option<i64> {
        let total = self.dampening.eval_total_setting as usize;
        self.window
            .push_back((obs.timestamp, obs.satisfied.then_some(obs.eval_set)));
        while self.window.len() > total {
            self.window.pop_front();
        }
        self.refresh_window_counts();
        (self.num_true_evals >= self.dampening.eval_true_setting).then_some(obs.timestamp)
    }

    fn perform_relaxed_time(&mut self, obs: Observation) -> Option<i64> {
        let now = obs.timestamp;
        let period = self.dampening.eval_time_setting;
        if obs.satisfied {
            self.window.push_back((now, Some(obs.eval_set)));
        }
        self.window.retain(|(ts, _)| now.saturating_sub(*ts) <= period);
        self.refresh_window_counts();
        self.true_evals_start_time = self.window.front().map(|(ts, _)| *ts);
        (self.num_true_evals >= self.dampening.eval_true_setting).then_some(now)
    }

    fn refresh_window_counts(&mut self) {
        let true_count = self.window.iter().filter(|(_, s)| s.is_some()).count();
        self.num_true_evals = u32::try_from(true_count).unwrap_or(u32::MAX);
    }

    fn decide(&mut self, satisfied_at: i64) -> DampeningDecision {
        let eval_sets = if self.satisfying.is_empty() {
            self.window.drain(..).filter_map(|(_, s)| s).collect()
        } else {
            std::mem::take(&mut self.satisfying)
        };
        let snapshot = DampeningSnapshot {
            dampening: self.dampening.clone(),
            num_true_evals: self.num_true_evals,
            num_evals: self.num_evals,
            true_evals_start_time: self.true_evals_start_time,
            satisfied_at,
        };
        self.reset();
        DampeningDecision {
            eval_sets,
            snapshot,
        }
    }
}
