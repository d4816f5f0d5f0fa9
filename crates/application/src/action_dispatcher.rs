use std::sync::Arc;

use domain::action::entity::{Action, Properties, bindings_for, merge_properties};
use domain::alert::entity::Alert;
use domain::common::entity::TenantId;
use domain::trigger::entity::TriggerAction;
use ports::secondary::action_listener::ActionListener;
use ports::secondary::definitions_service::DefinitionsService;
use ports::secondary::metrics_port::MetricsPort;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::retry::{RetryConfig, retry_with_backoff};

/// Plugin name that receives every action.
pub const WILDCARD_PLUGIN: &str = "*";

struct ListenerQueue {
    plugin: String,
    listener: String,
    tx: mpsc::Sender<Action>,
}

/// Turns alert transitions into actions and hands them to listeners.
///
/// Every registered listener owns a bounded queue drained by its own task,
/// so a slow listener never blocks the engine: a full queue drops the action.
pub struct ActionDispatcher {
    definitions: Arc<dyn DefinitionsService>,
    metrics: Arc<dyn MetricsPort>,
    retry: RetryConfig,
    queue_capacity: usize,
    queues: Vec<ListenerQueue>,
}

impl ActionDispatcher {
    pub fn new(definitions: Arc<dyn DefinitionsService>, metrics: Arc<dyn MetricsPort>) -> Self {
        Self {
            definitions,
            metrics,
            retry: RetryConfig::default(),
            queue_capacity: 256,
            queues: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Register `listener` for actions of `plugin` (or [`WILDCARD_PLUGIN`])
    /// and spawn its worker. The worker drains its queue once `cancel_token`
    /// fires and then exits.
    pub fn register(
        &mut self,
        plugin: &str,
        listener: Arc<dyn ActionListener>,
        cancel_token: CancellationToken,
    ) -> JoinHandle<()> {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        self.queues.push(ListenerQueue {
            plugin: plugin.to_string(),
            listener: listener.name().to_string(),
            tx,
        });
        tracing::info!(
            action_plugin = plugin,
            listener = listener.name(),
            capacity = self.queue_capacity,
            "action listener registered"
        );

        let worker = ListenerWorker {
            listener,
            retry: self.retry.clone(),
            metrics: Arc::clone(&self.metrics),
        };
        tokio::spawn(worker.run(rx, cancel_token))
    }

    pub fn listener_count(&self) -> usize {
        self.queues.len()
    }

    /// Generate and enqueue the actions for `alert` in its current status.
    /// Returns the number of queued deliveries.
    pub fn dispatch(&self, alert: &Alert, ctime: i64) -> usize {
        bindings_for(alert, alert.status)
            .filter_map(|binding| {
                let properties = self.resolve_properties(&alert.tenant_id, binding)?;
                Some(Action::new(alert, binding, properties, ctime))
            })
            .map(|action| self.enqueue(&action))
            .sum()
    }

    /// Plugin defaults overlaid with the action's own properties. `None`
    /// skips the binding.
    fn resolve_properties(&self, tenant_id: &TenantId, binding: &TriggerAction) -> Option<Properties> {
        let plugin = binding.action_plugin.as_str();
        let specific = match self
            .definitions
            .get_action(tenant_id, plugin, &binding.action_id)
        {
            Ok(Some(p)) => p,
            Ok(None) => {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    action_plugin = plugin,
                    action_id = %binding.action_id,
                    "action definition not found, skipping"
                );
                self.metrics
                    .record_action_dropped(plugin, "definition_missing");
                return None;
            }
            Err(e) => {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    action_plugin = plugin,
                    action_id = %binding.action_id,
                    error = %e,
                    "action lookup failed, skipping"
                );
                self.metrics
                    .record_action_dropped(plugin, "definition_error");
                return None;
            }
        };

        let defaults = match self.definitions.get_default_action_plugin(plugin) {
            Ok(p) => p.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(
                    action_plugin = plugin,
                    error = %e,
                    "plugin defaults lookup failed, skipping"
                );
                self.metrics
                    .record_action_dropped(plugin, "definition_error");
                return None;
            }
        };

        Some(merge_properties(&defaults, &specific))
    }

    /// Hand `action` to every listener registered for its plugin or the
    /// wildcard. Never blocks.
    pub fn enqueue(&self, action: &Action) -> usize {
        let plugin = action.action_plugin.as_str();
        let mut queued = 0;
        let mut routed = false;

        for queue in self
            .queues
            .iter()
            .filter(|q| q.plugin == plugin || q.plugin == WILDCARD_PLUGIN)
        {
            routed = true;
            match queue.tx.try_send(action.clone()) {
                Ok(()) => {
                    self.metrics.record_action_queued(plugin);
                    queued += 1;
                }
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        alert_id = %action.alert_id,
                        action_plugin = plugin,
                        listener = %queue.listener,
                        "listener queue full, action dropped"
                    );
                    self.metrics.record_action_dropped(plugin, "queue_full");
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::warn!(
                        alert_id = %action.alert_id,
                        action_plugin = plugin,
                        listener = %queue.listener,
                        "listener stopped, action dropped"
                    );
                    self.metrics.record_action_dropped(plugin, "listener_closed");
                }
            }
        }

        if !routed {
            tracing::debug!(
                alert_id = %action.alert_id,
                action_plugin = plugin,
                "no listener registered for plugin"
            );
            self.metrics.record_action_dropped(plugin, "no_listener");
        }
        queued
    }
}

/// Drains one listener queue.
struct ListenerWorker {
    listener: Arc<dyn ActionListener>,
    retry: RetryConfig,
    metrics: Arc<dyn MetricsPort>,
}

impl ListenerWorker {
    async fn run(self, mut rx: mpsc::Receiver<Action>, cancel_token: CancellationToken) {
        let mut count: u64 = 0;

        loop {
            tokio::select! {
                () = cancel_token.cancelled() => {
                    // Drain remaining actions before exiting
                    while let Ok(action) = rx.try_recv() {
                        count += 1;
                        self.deliver(&action).await;
                    }
                    break;
                }
                msg = rx.recv() => {
                    match msg {
                        Some(action) => {
                            count += 1;
                            self.deliver(&action).await;
                        }
                        None => break, // dispatcher dropped
                    }
                }
            }
        }

        tracing::info!(
            listener = self.listener.name(),
            total_actions = count,
            "action listener stopped"
        );
    }

    async fn deliver(&self, action: &Action) {
        let listener = &self.listener;
        match retry_with_backoff(&self.retry, || listener.process(action)).await {
            Ok(attempts) => {
                self.metrics.record_action_delivered(&action.action_plugin);
                tracing::debug!(
                    alert_id = %action.alert_id,
                    action_plugin = %action.action_plugin,
                    action_id = %action.action_id,
                    attempts,
                    "action delivered"
                );
            }
            Err(e) => {
                self.metrics.record_action_failed(&action.action_plugin);
                tracing::warn!(
                    alert_id = %action.alert_id,
                    action_plugin = %action.action_plugin,
                    action_id = %action.action_id,
                    listener = listener.name(),
                    error = %e,
                    "action delivery failed"
                );
            }
        }
    }
}
