#![no_main]

use libfuzzer_sys::fuzz_target;

use domain::common::entity::{Mode, TenantId, TriggerId};
use domain::condition::entity::{ConditionEval, EvalSet};
use domain::correlation::engine::Observation;
use domain::dampening::engine::DampeningState;
use domain::dampening::entity::Dampening;
use domain::fact::entity::FactKey;

// Fuzz the dampening strategies with arbitrary observation streams.
//
// Layout:
//   [0]    = strategy (0–3)
//   [1]    = eval_true_setting (1–16)
//   [2]    = eval_total / period factor (1–255)
//   rest   = consumed in 3-byte chunks: [satisfied, dt_lo, dt_hi]
fuzz_target!(|data: &[u8]| {
    if data.len() < 6 {
        return;
    }
    let tenant = TenantId("fuzz".to_string());
    let trigger = TriggerId("fuzz".to_string());
    let n = u32::from(data[1] % 16) + 1;
    let m = u32::from(data[2]).max(n);
    let period = i64::from(data[2]).max(1) * 100;

    let dampening = match data[0] % 4 {
        0 => Dampening::for_strict(tenant, trigger, Mode::Firing, n),
        1 => Dampening::for_strict_time(tenant, trigger, Mode::Firing, period),
        2 => Dampening::for_relaxed_count(tenant, trigger, Mode::Firing, n, m),
        _ => Dampening::for_relaxed_time(tenant, trigger, Mode::Firing, n, period),
    };
    let Ok(dampening) = dampening else {
        return;
    };
    let mut state = DampeningState::new(dampening);

    let mut ts: i64 = 0;
    for chunk in data[3..].chunks_exact(3) {
        ts += i64::from(u16::from_le_bytes([chunk[1], chunk[2]]));
        let satisfied = chunk[0] & 1 == 1;
        let eval = ConditionEval {
            condition_id: "fuzz-FIRING-1-0".to_string(),
            condition_set_index: 0,
            condition_type: "THRESHOLD".to_string(),
            matched: satisfied,
            eval_timestamp: ts,
            fact: FactKey::Data {
                data_id: "x".to_string(),
                timestamp: ts,
            },
            display: String::new(),
        };
        let obs = Observation {
            satisfied,
            eval_set: EvalSet::from([eval]),
            timestamp: ts,
        };
        if let Some(decision) = state.perform(obs) {
            assert!(satisfied);
            assert!(!decision.eval_sets.is_empty());
            assert_eq!(state.num_true_evals(), 0);
        }
    }
});
