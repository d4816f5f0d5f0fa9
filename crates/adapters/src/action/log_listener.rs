use std::future::Future;
use std::pin::Pin;

use domain::action::entity::Action;
use domain::common::error::DomainError;
use ports::secondary::action_listener::ActionListener;

/// Action listener that logs actions via tracing.
///
/// Registered for the `log` plugin by default, or for `*` to trace every
/// action the engine emits.
pub struct LogActionListener;

impl ActionListener for LogActionListener {
    fn name(&self) -> &str {
        "log"
    }

    fn process<'a>(
        &'a self,
        action: &'a Action,
    ) -> Pin<Box<dyn Future<Output = Result<(), DomainError>> + Send + 'a>> {
        Box::pin(async move {
            tracing::info!(
                tenant_id = %action.tenant_id,
                action_plugin = %action.action_plugin,
                action_id = %action.action_id,
                alert_id = %action.alert_id,
                trigger_id = %action.alert.trigger.id,
                status = %action.alert.status,
                severity = action.alert.severity.as_label(),
                ctime = action.ctime,
                message = action.message.as_deref().unwrap_or_default(),
                "action received"
            );
            Ok(())
        })
    }
}
