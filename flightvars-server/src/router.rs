use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use flightvars_core::api::{ApiError, FlightVars, SubscriptionId, VarUpdateHandler};
use flightvars_core::codec::{VariableGroup, VariableId, VariableValue};
use std::sync::Arc;
use tracing::debug;

/// Routes API calls to the master owning each variable group.
///
/// One master serves one group; the router remembers which master issued
/// every live subscription so unsubscriptions and updates can be forwarded
/// without knowing the variable.
pub struct Router {
    masters: DashMap<String, Arc<dyn FlightVars>>,
    subscriptions: DashMap<SubscriptionId, Arc<dyn FlightVars>>,
}

impl Router {
    pub fn new() -> Router {
        Router {
            masters: DashMap::new(),
            subscriptions: DashMap::new(),
        }
    }

    /// Register a master for the given variable group. Fails if the group
    /// already has one.
    pub fn register_group_master(
        &self,
        group: VariableGroup,
        master: Arc<dyn FlightVars>,
    ) -> Result<(), ApiError> {
        match self.masters.entry(group.as_str().to_string()) {
            Entry::Occupied(_) => Err(ApiError::MasterAlreadyRegistered(group)),
            Entry::Vacant(entry) => {
                debug!("master registered for variable group {}", group);
                entry.insert(master);
                Ok(())
            }
        }
    }

    fn master_by_var(&self, var_id: &VariableId) -> Result<Arc<dyn FlightVars>, ApiError> {
        self.masters
            .get(var_id.group.as_str())
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ApiError::NoSuchVariable(var_id.clone()))
    }

    fn master_by_subs(&self, subs_id: SubscriptionId) -> Result<Arc<dyn FlightVars>, ApiError> {
        self.subscriptions
            .get(&subs_id)
            .map(|entry| entry.value().clone())
            .ok_or(ApiError::NoSuchSubscription(subs_id))
    }
}

impl Default for Router {
    fn default() -> Router {
        Router::new()
    }
}

impl FlightVars for Router {
    fn subscribe(
        &self,
        var: &VariableId,
        handler: VarUpdateHandler,
    ) -> Result<SubscriptionId, ApiError> {
        let master = self.master_by_var(var)?;
        let subs_id = master.subscribe(var, handler)?;
        self.subscriptions.insert(subs_id, master);
        Ok(subs_id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> Result<(), ApiError> {
        let master = self.master_by_subs(id)?;
        master.unsubscribe(id)?;
        self.subscriptions.remove(&id);
        Ok(())
    }

    fn update(&self, id: SubscriptionId, value: &VariableValue) -> Result<(), ApiError> {
        let master = self.master_by_subs(id)?;
        master.update(id, value)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use flightvars_core::api::make_subscription_id;
    use std::sync::Mutex;

    #[derive(Default)]
    struct StubMaster {
        calls: Mutex<Vec<String>>,
    }

    impl StubMaster {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl FlightVars for StubMaster {
        fn subscribe(
            &self,
            var: &VariableId,
            _handler: VarUpdateHandler,
        ) -> Result<SubscriptionId, ApiError> {
            self.calls.lock().unwrap().push(format!("subscribe {}", var));
            Ok(make_subscription_id())
        }

        fn unsubscribe(&self, id: SubscriptionId) -> Result<(), ApiError> {
            self.calls.lock().unwrap().push(format!("unsubscribe {}", id));
            Ok(())
        }

        fn update(&self, id: SubscriptionId, value: &VariableValue) -> Result<(), ApiError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("update {} {}", id, value));
            Ok(())
        }
    }

    fn handler() -> VarUpdateHandler {
        Arc::new(|_, _| {})
    }

    #[test]
    fn group_can_have_only_one_master() {
        let router = Router::new();
        let group = VariableGroup::new("fsuipc/offset");
        router
            .register_group_master(group.clone(), Arc::new(StubMaster::default()))
            .unwrap();
        assert_eq!(
            router.register_group_master(group.clone(), Arc::new(StubMaster::default())),
            Err(ApiError::MasterAlreadyRegistered(group))
        );
    }

    #[test]
    fn operations_are_routed_to_the_owning_master() {
        let router = Router::new();
        let master = Arc::new(StubMaster::default());
        router
            .register_group_master(VariableGroup::new("fsuipc/offset"), master.clone())
            .unwrap();

        let var = VariableId::new("fsuipc/offset", "0x1000:1");
        let subs_id = router.subscribe(&var, handler()).unwrap();
        router.update(subs_id, &VariableValue::Byte(0x42)).unwrap();
        router.unsubscribe(subs_id).unwrap();

        assert_eq!(
            master.calls(),
            vec![
                format!("subscribe {}", var),
                format!("update {} {}", subs_id, VariableValue::Byte(0x42)),
                format!("unsubscribe {}", subs_id),
            ]
        );

        // The subscription is forgotten once unsubscribed.
        assert_eq!(
            router.update(subs_id, &VariableValue::Byte(0)),
            Err(ApiError::NoSuchSubscription(subs_id))
        );
    }

    #[test]
    fn unknown_groups_and_subscriptions_are_reported() {
        let router = Router::new();
        let var = VariableId::new("unknown", "foo");
        assert_eq!(
            router.subscribe(&var, handler()),
            Err(ApiError::NoSuchVariable(var))
        );
        assert_eq!(router.unsubscribe(999), Err(ApiError::NoSuchSubscription(999)));
    }
}
