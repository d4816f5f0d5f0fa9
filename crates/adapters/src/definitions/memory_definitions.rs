use std::collections::HashMap;
use std::sync::RwLock;

use domain::action::entity::Properties;
use domain::common::entity::TenantId;
use domain::common::error::DomainError;
use ports::secondary::definitions_service::DefinitionsService;

type ActionKey = (TenantId, String, String);

/// Definitions service backed by maps loaded from configuration.
///
/// Entries may be replaced at runtime; readers always see a complete map.
#[derive(Default)]
pub struct InMemoryDefinitions {
    plugins: RwLock<HashMap<String, Properties>>,
    actions: RwLock<HashMap<ActionKey, Properties>>,
}

impl InMemoryDefinitions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the default properties of a plugin.
    pub fn add_plugin(&self, action_plugin: &str, defaults: Properties) -> Result<(), DomainError> {
        self.plugins
            .write()
            .map_err(|e| DomainError::EngineError(format!("lock poisoned: {e}")))?
            .insert(action_plugin.to_string(), defaults);
        Ok(())
    }

    /// Register or replace one action definition.
    pub fn add_action(
        &self,
        tenant_id: &TenantId,
        action_plugin: &str,
        action_id: &str,
        properties: Properties,
    ) -> Result<(), DomainError> {
        self.actions
            .write()
            .map_err(|e| DomainError::EngineError(format!("lock poisoned: {e}")))?
            .insert(
                (
                    tenant_id.clone(),
                    action_plugin.to_string(),
                    action_id.to_string(),
                ),
                properties,
            );
        Ok(())
    }

    pub fn remove_action(
        &self,
        tenant_id: &TenantId,
        action_plugin: &str,
        action_id: &str,
    ) -> Result<bool, DomainError> {
        let removed = self
            .actions
            .write()
            .map_err(|e| DomainError::EngineError(format!("lock poisoned: {e}")))?
            .remove(&(
                tenant_id.clone(),
                action_plugin.to_string(),
                action_id.to_string(),
            ));
        Ok(removed.is_some())
    }

    pub fn action_count(&self) -> usize {
        self.actions.read().map(|m| m.len()).unwrap_or_default()
    }
}

impl DefinitionsService for InMemoryDefinitions {
    fn get_action(
        &self,
        tenant_id: &TenantId,
        action_plugin: &str,
        action_id: &str,
    ) -> Result<Option<Properties>, DomainError> {
        let actions = self
            .actions
            .read()
            .map_err(|e| DomainError::EngineError(format!("lock poisoned: {e}")))?;
        Ok(actions
            .get(&(
                tenant_id.clone(),
                action_plugin.to_string(),
                action_id.to_string(),
            ))
            .cloned())
    }

    fn get_default_action_plugin(
        &self,
        action_plugin: &str,
    ) -> Result<Option<Properties>, DomainError> {
        let plugins = self
            .plugins
            .read()
            .map_err(|e| DomainError::EngineError(format!("lock poisoned: {e}")))?;
        Ok(plugins.get(action_plugin).cloned())
    }
}
