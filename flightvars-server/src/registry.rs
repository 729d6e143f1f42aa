use flightvars_core::api::SubscriptionId;
use flightvars_core::codec::VariableId;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("variable {0} is already registered")]
    DuplicatedVariable(VariableId),

    #[error("subscription {0} is already registered")]
    DuplicatedSubscription(SubscriptionId),

    #[error("unknown variable {0}")]
    UnknownVariable(VariableId),

    #[error("unknown subscription {0}")]
    UnknownSubscription(SubscriptionId),
}

/// The per-session bijection between variables and the subscription
/// identifiers the server assigned for them.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    by_var: HashMap<VariableId, SubscriptionId>,
    by_subs: HashMap<SubscriptionId, VariableId>,
}

impl SubscriptionRegistry {
    pub fn new() -> SubscriptionRegistry {
        SubscriptionRegistry::default()
    }

    pub fn register(
        &mut self,
        var_id: VariableId,
        subs_id: SubscriptionId,
    ) -> Result<(), RegistryError> {
        if self.by_var.contains_key(&var_id) {
            return Err(RegistryError::DuplicatedVariable(var_id));
        }
        if self.by_subs.contains_key(&subs_id) {
            return Err(RegistryError::DuplicatedSubscription(subs_id));
        }
        self.by_var.insert(var_id.clone(), subs_id);
        self.by_subs.insert(subs_id, var_id);
        Ok(())
    }

    pub fn subscription_for(&self, var_id: &VariableId) -> Result<SubscriptionId, RegistryError> {
        self.by_var
            .get(var_id)
            .copied()
            .ok_or_else(|| RegistryError::UnknownVariable(var_id.clone()))
    }

    pub fn variable_for(&self, subs_id: SubscriptionId) -> Result<&VariableId, RegistryError> {
        self.by_subs
            .get(&subs_id)
            .ok_or(RegistryError::UnknownSubscription(subs_id))
    }

    pub fn contains_subscription(&self, subs_id: SubscriptionId) -> bool {
        self.by_subs.contains_key(&subs_id)
    }

    pub fn unregister_by_var(
        &mut self,
        var_id: &VariableId,
    ) -> Result<SubscriptionId, RegistryError> {
        let subs_id = self
            .by_var
            .remove(var_id)
            .ok_or_else(|| RegistryError::UnknownVariable(var_id.clone()))?;
        self.by_subs.remove(&subs_id);
        Ok(subs_id)
    }

    pub fn unregister_by_subs(
        &mut self,
        subs_id: SubscriptionId,
    ) -> Result<VariableId, RegistryError> {
        let var_id = self
            .by_subs
            .remove(&subs_id)
            .ok_or(RegistryError::UnknownSubscription(subs_id))?;
        self.by_var.remove(&var_id);
        Ok(var_id)
    }

    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&VariableId, SubscriptionId),
    {
        for (var_id, subs_id) in &self.by_var {
            f(var_id, *subs_id);
        }
    }

    pub fn clear(&mut self) {
        self.by_var.clear();
        self.by_subs.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.by_var.is_empty()
    }
}
