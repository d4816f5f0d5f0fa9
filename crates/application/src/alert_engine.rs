use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use domain::alert::entity::Alert;
use domain::alert::error::AlertError;
use domain::alert::lifecycle::AUTO_ACTOR;
use domain::alert::query::AlertQuery;
use domain::common::entity::{Mode, TenantId, TriggerId};
use domain::common::error::DomainError;
use domain::condition::evaluator::DataHistory;
use domain::fact::entity::{Fact, sort_facts};
use domain::trigger::entity::{Trigger, TriggerDefinition};
use domain::trigger::state_machine::{TriggerDecision, TriggerRuntime};
use ports::secondary::alert_store::AlertStore;
use ports::secondary::metrics_port::MetricsPort;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::action_dispatcher::ActionDispatcher;

type TriggerKey = (TenantId, TriggerId);

/// Control messages applied between ticks.
#[derive(Debug, Clone)]
pub enum EngineCommand {
    AddTrigger(Box<TriggerDefinition>),
    UpdateTrigger(Box<TriggerDefinition>),
    RemoveTrigger {
        tenant_id: TenantId,
        trigger_id: TriggerId,
    },
    EnableTrigger {
        tenant_id: TenantId,
        trigger_id: TriggerId,
    },
    DisableTrigger {
        tenant_id: TenantId,
        trigger_id: TriggerId,
    },
    Acknowledge {
        tenant_id: TenantId,
        alert_id: String,
        actor: String,
        notes: Option<String>,
    },
    Resolve {
        tenant_id: TenantId,
        alert_id: String,
        actor: String,
        notes: Option<String>,
    },
}

/// What happened during one tick.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickSummary {
    pub facts: usize,
    pub triggers_evaluated: usize,
    pub faults: usize,
    pub alerts_opened: Vec<String>,
    pub alerts_resolved: Vec<String>,
}

/// Single-writer alert engine.
///
/// Owns every trigger runtime and the data history. Facts arrive in batches
/// (ticks); commands are applied between ticks so a disable is observed by
/// the very next tick.
pub struct AlertEngine {
    triggers: BTreeMap<TriggerKey, TriggerRuntime>,
    history: DataHistory,
    store: Arc<dyn AlertStore>,
    metrics: Arc<dyn MetricsPort>,
    dispatcher: Option<ActionDispatcher>,
}

impl AlertEngine {
    pub fn new(store: Arc<dyn AlertStore>, metrics: Arc<dyn MetricsPort>) -> Self {
        Self {
            triggers: BTreeMap::new(),
            history: DataHistory::new(),
            store,
            metrics,
            dispatcher: None,
        }
    }

    /// Attach the dispatcher that turns alert transitions into actions.
    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: ActionDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn trigger_count(&self) -> usize {
        self.triggers.len()
    }

    pub fn trigger(&self, tenant_id: &TenantId, trigger_id: &TriggerId) -> Option<&Trigger> {
        self.triggers
            .get(&(tenant_id.clone(), trigger_id.clone()))
            .map(TriggerRuntime::trigger)
    }

    // ── Trigger management ────────────────────────────────────────

    pub fn add_trigger(&mut self, definition: TriggerDefinition) -> Result<(), DomainError> {
        let key = (definition.trigger.tenant_id.clone(), definition.trigger.id.clone());
        if self.triggers.contains_key(&key) {
            return Err(DomainError::DuplicateTrigger(key.1.0));
        }
        let runtime = TriggerRuntime::from_definition(definition)?;
        tracing::info!(
            tenant_id = %key.0,
            trigger_id = %key.1,
            enabled = runtime.is_enabled(),
            autoresolve = runtime.has_autoresolve(),
            "trigger added"
        );
        self.triggers.insert(key, runtime);
        self.metrics.set_triggers_loaded(self.triggers.len() as u64);
        Ok(())
    }

    /// Replace a trigger definition. All accumulated state is discarded.
    pub fn update_trigger(&mut self, definition: TriggerDefinition) -> Result<(), DomainError> {
        let key = (definition.trigger.tenant_id.clone(), definition.trigger.id.clone());
        let slot = self
            .triggers
            .get_mut(&key)
            .ok_or_else(|| DomainError::TriggerNotFound(key.1.0.clone()))?;
        *slot = TriggerRuntime::from_definition(definition)?;
        tracing::info!(tenant_id = %key.0, trigger_id = %key.1, "trigger updated");
        Ok(())
    }

    pub fn remove_trigger(
        &mut self,
        tenant_id: &TenantId,
        trigger_id: &TriggerId,
    ) -> Result<(), DomainError> {
        self.triggers
            .remove(&(tenant_id.clone(), trigger_id.clone()))
            .ok_or_else(|| DomainError::TriggerNotFound(trigger_id.0.clone()))?;
        tracing::info!(tenant_id = %tenant_id, trigger_id = %trigger_id, "trigger removed");
        self.metrics.set_triggers_loaded(self.triggers.len() as u64);
        Ok(())
    }

    pub fn set_enabled(
        &mut self,
        tenant_id: &TenantId,
        trigger_id: &TriggerId,
        enabled: bool,
    ) -> Result<(), DomainError> {
        let runtime = self.runtime_mut(tenant_id, trigger_id)?;
        if enabled {
            runtime.enable();
        } else {
            runtime.disable();
        }
        tracing::info!(tenant_id = %tenant_id, trigger_id = %trigger_id, enabled, "trigger state changed");
        Ok(())
    }

    fn runtime_mut(
        &mut self,
        tenant_id: &TenantId,
        trigger_id: &TriggerId,
    ) -> Result<&mut TriggerRuntime, DomainError> {
        self.triggers
            .get_mut(&(tenant_id.clone(), trigger_id.clone()))
            .ok_or_else(|| DomainError::TriggerNotFound(trigger_id.0.clone()))
    }

    // ── Evaluation ────────────────────────────────────────────────

    /// Evaluate one batch of facts against every enabled trigger.
    ///
    /// A failure (or panic) inside one trigger is logged, its state reset and
    /// the remaining triggers still run.
    pub fn process_tick(&mut self, mut facts: Vec<Fact>) -> TickSummary {
        let started = Instant::now();
        sort_facts(&mut facts);

        let mut summary = TickSummary {
            facts: facts.len(),
            ..TickSummary::default()
        };
        let mut decisions = Vec::new();

        for ((tenant_id, trigger_id), runtime) in &mut self.triggers {
            if !runtime.is_enabled() {
                continue;
            }
            summary.triggers_evaluated += 1;

            // evaluation may switch the mode or auto-disable; alerts carry
            // the trigger as it was when the tick started
            let snapshot = runtime.trigger().clone();
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                runtime.evaluate_tick(&facts, &self.history)
            }));
            match outcome {
                Ok(Ok(Some(decision))) => decisions.push((snapshot, decision)),
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    summary.faults += 1;
                    self.metrics.record_trigger_fault("evaluation");
                    tracing::warn!(
                        tenant_id = %tenant_id,
                        trigger_id = %trigger_id,
                        error = %e,
                        "trigger evaluation failed, tick skipped"
                    );
                }
                Err(_) => {
                    summary.faults += 1;
                    runtime.reset();
                    self.metrics.record_trigger_fault("panic");
                    tracing::error!(
                        tenant_id = %tenant_id,
                        trigger_id = %trigger_id,
                        "trigger evaluation panicked, state reset"
                    );
                }
            }
        }

        self.history.record_tick(&facts);

        for (trigger, decision) in decisions {
            if let Err(e) = self.apply_decision(&trigger, decision, &mut summary) {
                tracing::warn!(
                    trigger_id = %trigger.id,
                    error = %e,
                    "failed to query unresolved alerts, trigger kept in AUTORESOLVE"
                );
                if let Some(runtime) = self
                    .triggers
                    .get_mut(&(trigger.tenant_id.clone(), trigger.id.clone()))
                {
                    runtime.hold_autoresolve();
                }
            }
        }

        self.metrics.record_tick(summary.facts as u64);
        self.metrics
            .observe_tick_duration(started.elapsed().as_secs_f64());
        summary
    }

    /// Errors only when the unresolved alerts of an autoresolving trigger
    /// cannot be read.
    fn apply_decision(
        &self,
        trigger: &Trigger,
        decision: TriggerDecision,
        summary: &mut TickSummary,
    ) -> Result<(), AlertError> {
        self.metrics
            .record_dampening_decision(decision.mode.as_str());
        let at = decision.dampening.satisfied_at;

        match decision.mode {
            Mode::Firing => {
                let mut alert = Alert::open(trigger, decision.dampening, decision.eval_sets, at);
                alert.alert_id = self.unique_alert_id(&alert);
                tracing::info!(
                    tenant_id = %alert.tenant_id,
                    trigger_id = %trigger.id,
                    alert_id = %alert.alert_id,
                    severity = alert.severity.as_label(),
                    next_mode = %decision.next_mode,
                    "alert opened"
                );
                if decision.auto_disabled {
                    tracing::info!(trigger_id = %trigger.id, "trigger auto-disabled after firing");
                }
                summary.alerts_opened.push(alert.alert_id.clone());
                self.commit(&alert, at);
            }
            Mode::Autoresolve => {
                if !trigger.auto_resolve_alerts {
                    tracing::debug!(trigger_id = %trigger.id, "autoresolve satisfied, alerts left open");
                    return Ok(());
                }
                for mut alert in self.unresolved(&trigger.tenant_id, &trigger.id.0)? {
                    match alert.resolve(
                        AUTO_ACTOR,
                        None,
                        Some(decision.eval_sets.clone()),
                        false,
                        at,
                    ) {
                        Ok(()) => {
                            tracing::info!(
                                tenant_id = %alert.tenant_id,
                                alert_id = %alert.alert_id,
                                "alert auto-resolved"
                            );
                            summary.alerts_resolved.push(alert.alert_id.clone());
                            self.commit(&alert, at);
                        }
                        Err(e) => self.report_rejected(&e),
                    }
                }
            }
        }
        Ok(())
    }

    fn unresolved(&self, tenant_id: &TenantId, trigger_id: &str) -> Result<Vec<Alert>, AlertError> {
        self.store
            .query_alerts(&AlertQuery::unresolved_for(tenant_id, trigger_id))
    }

    /// `alert.alert_id` when free, otherwise the first free `{id}-{n}`.
    ///
    /// Two satisfying ticks can share a timestamp (same ctime events, a
    /// replayed point); a stored alert is never overwritten by a new one.
    fn unique_alert_id(&self, alert: &Alert) -> String {
        let base = &alert.alert_id;
        let taken = |id: &str| match self.store.get_alert(&alert.tenant_id, id) {
            Ok(existing) => existing.is_some(),
            Err(e) => {
                tracing::warn!(alert_id = id, error = %e, "alert id lookup failed");
                false
            }
        };
        if !taken(base) {
            return base.clone();
        }
        let mut n: u64 = 1;
        loop {
            let candidate = format!("{base}-{n}");
            if !taken(&candidate) {
                tracing::debug!(alert_id = %candidate, "alert id collision, suffix added");
                return candidate;
            }
            n += 1;
        }
    }

    /// Persist the alert, then notify. Neither failure rolls back the
    /// transition.
    fn commit(&self, alert: &Alert, at: i64) {
        self.metrics
            .record_alert_transition(alert.status.as_str(), alert.severity.as_label());
        if let Err(e) = self.store.store_alert(alert) {
            tracing::warn!(alert_id = %alert.alert_id, error = %e, "failed to store alert");
        }
        if let Some(ref dispatcher) = self.dispatcher {
            dispatcher.dispatch(alert, at);
        }
    }

    fn report_rejected(&self, e: &AlertError) {
        if let AlertError::InvalidTransition { operation, .. } = e {
            self.metrics.record_invalid_transition(operation);
        }
        tracing::warn!(error = %e, "alert transition rejected");
    }

    // ── Manual lifecycle ──────────────────────────────────────────

    fn load_alert(&self, tenant_id: &TenantId, alert_id: &str) -> Result<Alert, DomainError> {
        self.store
            .get_alert(tenant_id, alert_id)?
            .ok_or_else(|| AlertError::NotFound(alert_id.to_string()).into())
    }

    pub fn acknowledge(
        &mut self,
        tenant_id: &TenantId,
        alert_id: &str,
        actor: &str,
        notes: Option<String>,
        now: i64,
    ) -> Result<(), DomainError> {
        let mut alert = self.load_alert(tenant_id, alert_id)?;
        if let Err(e) = alert.acknowledge(actor, notes, now) {
            self.report_rejected(&e);
            return Err(e.into());
        }
        tracing::info!(tenant_id = %tenant_id, alert_id, actor, "alert acknowledged");
        self.commit(&alert, now);
        Ok(())
    }

    /// Resolve by hand. When this closes the last unresolved alert of a
    /// trigger waiting in AUTORESOLVE, the trigger returns to FIRING.
    pub fn resolve(
        &mut self,
        tenant_id: &TenantId,
        alert_id: &str,
        actor: &str,
        notes: Option<String>,
        now: i64,
    ) -> Result<(), DomainError> {
        let mut alert = self.load_alert(tenant_id, alert_id)?;
        if let Err(e) = alert.resolve(actor, notes, None, true, now) {
            self.report_rejected(&e);
            return Err(e.into());
        }
        tracing::info!(tenant_id = %tenant_id, alert_id, actor, "alert resolved");
        self.commit(&alert, now);

        let trigger_id = alert.trigger.id.clone();
        let remaining = match self.unresolved(tenant_id, &trigger_id.0) {
            Ok(open) => open.len(),
            Err(e) => {
                tracing::warn!(
                    trigger_id = %trigger_id,
                    error = %e,
                    "failed to query unresolved alerts, trigger mode unchanged"
                );
                return Err(e.into());
            }
        };
        if remaining == 0
            && let Some(runtime) = self.triggers.get_mut(&(tenant_id.clone(), trigger_id))
            && runtime.mode() == Mode::Autoresolve
        {
            runtime.return_to_firing();
            tracing::info!(trigger_id = %alert.trigger.id, "trigger returned to FIRING");
        }
        Ok(())
    }

    // ── Commands / run loop ───────────────────────────────────────

    pub fn apply_command(&mut self, command: EngineCommand) -> Result<(), DomainError> {
        match command {
            EngineCommand::AddTrigger(def) => self.add_trigger(*def),
            EngineCommand::UpdateTrigger(def) => self.update_trigger(*def),
            EngineCommand::RemoveTrigger {
                tenant_id,
                trigger_id,
            } => self.remove_trigger(&tenant_id, &trigger_id),
            EngineCommand::EnableTrigger {
                tenant_id,
                trigger_id,
            } => self.set_enabled(&tenant_id, &trigger_id, true),
            EngineCommand::DisableTrigger {
                tenant_id,
                trigger_id,
            } => self.set_enabled(&tenant_id, &trigger_id, false),
            EngineCommand::Acknowledge {
                tenant_id,
                alert_id,
                actor,
                notes,
            } => self.acknowledge(&tenant_id, &alert_id, &actor, notes, now_ms()),
            EngineCommand::Resolve {
                tenant_id,
                alert_id,
                actor,
                notes,
            } => self.resolve(&tenant_id, &alert_id, &actor, notes, now_ms()),
        }
    }

    fn handle_command(&mut self, command: EngineCommand) {
        if let Err(e) = self.apply_command(command) {
            tracing::warn!(error = %e, "engine command failed");
        }
    }

    /// Consume fact batches and commands until cancelled or the fact stream
    /// ends. Pending commands are always applied before the next tick.
    pub async fn run(
        mut self,
        mut facts_rx: mpsc::Receiver<Vec<Fact>>,
        mut commands_rx: mpsc::Receiver<EngineCommand>,
        cancel_token: CancellationToken,
    ) {
        let mut ticks: u64 = 0;
        let mut commands_open = true;

        loop {
            tokio::select! {
                biased;
                () = cancel_token.cancelled() => {
                    // Drain what already arrived before exiting
                    while let Ok(command) = commands_rx.try_recv() {
                        self.handle_command(command);
                    }
                    while let Ok(batch) = facts_rx.try_recv() {
                        ticks += 1;
                        self.process_tick(batch);
                    }
                    break;
                }
                cmd = commands_rx.recv(), if commands_open => {
                    match cmd {
                        Some(command) => self.handle_command(command),
                        None => commands_open = false,
                    }
                }
                batch = facts_rx.recv() => {
                    match batch {
                        Some(batch) => {
                            ticks += 1;
                            self.process_tick(batch);
                        }
                        None => break, // fact source finished
                    }
                }
            }
        }

        tracing::info!(total_ticks = ticks, triggers = self.triggers.len(), "alert engine stopped");
    }
}

/// Wall-clock milliseconds, used for manual lifecycle operations.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}
