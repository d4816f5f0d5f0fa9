use super::entity::{Alert, AlertStatus, LifecycleEntry};
use super::error::AlertError;
use crate::condition::entity::EvalSet;
use crate::dampening::engine::DampeningSnapshot;
use crate::trigger::entity::Trigger;

/// Actor recorded for transitions performed by the engine itself.
pub const AUTO_ACTOR: &str = "AUTO";

/// Identifier of the alert a trigger opens at `ctime`.
pub fn alert_id(trigger: &Trigger, ctime: i64) -> String {
    format!("{}-{ctime}", trigger.id)
}

impl Alert {
    /// Create a new OPEN alert for `trigger`.
    pub fn open(
        trigger: &Trigger,
        dampening: DampeningSnapshot,
        eval_sets: Vec<EvalSet>,
        ctime: i64,
    ) -> Self {
        Self {
            tenant_id: trigger.tenant_id.clone(),
            alert_id: alert_id(trigger, ctime),
            trigger: trigger.clone(),
            dampening,
            eval_sets,
            severity: trigger.severity,
            status: AlertStatus::Open,
            ctime,
            ack_by: None,
            ack_time: None,
            ack_notes: None,
            resolved_by: None,
            resolved_time: None,
            resolved_notes: None,
            resolved_eval_sets: None,
            lifecycle: vec![LifecycleEntry {
                status: AlertStatus::Open,
                user: AUTO_ACTOR.to_string(),
                stime: ctime,
            }],
        }
    }

    /// OPEN → ACKNOWLEDGED.
    pub fn acknowledge(
        &mut self,
        actor: &str,
        notes: Option<String>,
        now: i64,
    ) -> Result<(), AlertError> {
        if self.status != AlertStatus::Open {
            return Err(self.rejected("acknowledged"));
        }
        self.status = AlertStatus::Acknowledged;
        self.ack_by = Some(actor.to_string());
        self.ack_time = Some(now);
        self.ack_notes = notes;
        self.record(actor, now);
        Ok(())
    }

    /// OPEN or ACKNOWLEDGED → RESOLVED.
    ///
    /// `resolved_eval_sets` is only kept for automatic resolution; a manual
    /// resolve has no causing evaluation.
    pub fn resolve(
        &mut self,
        actor: &str,
        notes: Option<String>,
        resolved_eval_sets: Option<Vec<EvalSet>>,
        manual: bool,
        now: i64,
    ) -> Result<(), AlertError> {
        if self.status.is_terminal() {
            return Err(self.rejected("resolved"));
        }
        self.status = AlertStatus::Resolved;
        self.resolved_by = Some(actor.to_string());
        self.resolved_time = Some(now);
        self.resolved_notes = notes;
        self.resolved_eval_sets = if manual { None } else { resolved_eval_sets };
        self.record(actor, now);
        Ok(())
    }

    fn record(&mut self, actor: &str, now: i64) {
        self.lifecycle.push(LifecycleEntry {
            status: self.status,
            user: actor.to_string(),
            stime: now,
        });
    }

    fn rejected(&self, operation: &'static str) -> AlertError {
        AlertError::InvalidTransition {
            alert_id: self.alert_id.clone(),
            status: self.status,
            operation,
        }
    }
}
