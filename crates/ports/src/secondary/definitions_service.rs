use domain::action::entity::Properties;
use domain::common::entity::TenantId;
use domain::common::error::DomainError;

/// Secondary port resolving action and plugin definitions.
///
/// `Ok(None)` means the definition does not exist; `Err` means the lookup
/// itself failed. Callers treat both as "skip this binding".
pub trait DefinitionsService: Send + Sync {
    /// Properties of one configured action.
    fn get_action(
        &self,
        tenant_id: &TenantId,
        action_plugin: &str,
        action_id: &str,
    ) -> Result<Option<Properties>, DomainError>;

    /// Default properties declared by a plugin.
    fn get_default_action_plugin(
        &self,
        action_plugin: &str,
    ) -> Result<Option<Properties>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyDefinitions;
    impl DefinitionsService for EmptyDefinitions {
        fn get_action(
            &self,
            _tenant_id: &TenantId,
            _action_plugin: &str,
            _action_id: &str,
        ) -> Result<Option<Properties>, DomainError> {
            Ok(None)
        }

        fn get_default_action_plugin(
            &self,
            _action_plugin: &str,
        ) -> Result<Option<Properties>, DomainError> {
            Ok(None)
        }
    }

    #[test]
    fn definitions_service_is_dyn_compatible() {
        let defs: Box<dyn DefinitionsService> = Box::new(EmptyDefinitions);
        let tenant = TenantId("t".to_string());
        assert!(defs.get_action(&tenant, "email", "ops").unwrap().is_none());
        assert!(defs.get_default_action_plugin("email").unwrap().is_none());
    }
}
