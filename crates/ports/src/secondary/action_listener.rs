use std::future::Future;
use std::pin::Pin;

use domain::action::entity::Action;
use domain::common::error::DomainError;

/// Secondary port receiving the actions generated for one plugin.
///
/// Uses `Pin<Box<dyn Future>>` return type (instead of RPITIT) so the trait
/// is dyn-compatible and can be used as `Arc<dyn ActionListener>`.
/// The engine never observes the outcome beyond logging it.
pub trait ActionListener: Send + Sync {
    /// Short name used in logs and metrics.
    fn name(&self) -> &str;

    /// Deliver one action. Transport resources are acquired and released
    /// within the call.
    fn process<'a>(
        &'a self,
        action: &'a Action,
    ) -> Pin<Box<dyn Future<Output = Result<(), DomainError>> + Send + 'a>>;
}
