use flightvars_core::api::{make_subscription_id, SubscriptionId, VarUpdateHandler};
use flightvars_core::codec::{VariableId, VariableValue};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DbError {
    #[error("variable {0} already exists in the client DB")]
    VariableAlreadyExists(VariableId),

    #[error("master subscription {0} already exists in the client DB")]
    MasterSubscriptionAlreadyExists(SubscriptionId),

    #[error("variable {0} was not found in the client DB")]
    NoSuchVariable(VariableId),

    #[error("master subscription {0} was not found in the client DB")]
    NoSuchMasterSubscription(SubscriptionId),

    #[error("virtual subscription {0} was not found in the client DB")]
    NoSuchVirtualSubscription(SubscriptionId),
}

struct VirtualSubscription {
    id: SubscriptionId,
    handler: VarUpdateHandler,
}

struct Entry {
    var_id: VariableId,
    master_subs_id: SubscriptionId,
    virtuals: Vec<VirtualSubscription>,
}

/// The client-side subscription database.
///
/// The server allows a single subscription per variable and session, while
/// the client API hands out one subscription per call. This DB ties both
/// worlds: one entry per variable holds the *master* subscription assigned
/// by the server and the list of *virtual* subscriptions the application
/// owns. An entry exists iff it has at least one virtual subscription.
#[derive(Default)]
pub struct SubscriptionDb {
    entries: HashMap<VariableId, Entry>,
    by_master: HashMap<SubscriptionId, VariableId>,
    by_virtual: HashMap<SubscriptionId, VariableId>,
}

impl SubscriptionDb {
    pub fn new() -> SubscriptionDb {
        SubscriptionDb::default()
    }

    /// Create the entry for a variable, attaching its first virtual
    /// subscription. Returns the virtual subscription identifier.
    pub fn create_entry(
        &mut self,
        var_id: VariableId,
        master_subs_id: SubscriptionId,
        handler: VarUpdateHandler,
    ) -> Result<SubscriptionId, DbError> {
        if self.entries.contains_key(&var_id) {
            return Err(DbError::VariableAlreadyExists(var_id));
        }
        if self.by_master.contains_key(&master_subs_id) {
            return Err(DbError::MasterSubscriptionAlreadyExists(master_subs_id));
        }
        let virtual_id = make_subscription_id();
        self.entries.insert(
            var_id.clone(),
            Entry {
                var_id: var_id.clone(),
                master_subs_id,
                virtuals: vec![VirtualSubscription {
                    id: virtual_id,
                    handler,
                }],
            },
        );
        self.by_master.insert(master_subs_id, var_id.clone());
        self.by_virtual.insert(virtual_id, var_id);
        Ok(virtual_id)
    }

    pub fn entry_defined(&self, var_id: &VariableId) -> bool {
        self.entries.contains_key(var_id)
    }

    /// Attach another virtual subscription to an existing entry.
    pub fn add_virtual_subscription(
        &mut self,
        var_id: &VariableId,
        handler: VarUpdateHandler,
    ) -> Result<SubscriptionId, DbError> {
        let entry = self
            .entries
            .get_mut(var_id)
            .ok_or_else(|| DbError::NoSuchVariable(var_id.clone()))?;
        let virtual_id = make_subscription_id();
        entry.virtuals.push(VirtualSubscription {
            id: virtual_id,
            handler,
        });
        self.by_virtual.insert(virtual_id, var_id.clone());
        Ok(virtual_id)
    }

    /// Remove a virtual subscription. When the last one goes, the whole
    /// entry is dropped and `true` is returned.
    pub fn remove_virtual_subscription(
        &mut self,
        virtual_subs_id: SubscriptionId,
    ) -> Result<bool, DbError> {
        let var_id = self
            .by_virtual
            .remove(&virtual_subs_id)
            .ok_or(DbError::NoSuchVirtualSubscription(virtual_subs_id))?;
        let entry = match self.entries.get_mut(&var_id) {
            Some(entry) => entry,
            None => return Err(DbError::NoSuchVariable(var_id)),
        };
        entry.virtuals.retain(|sub| sub.id != virtual_subs_id);
        if entry.virtuals.is_empty() {
            let master = entry.master_subs_id;
            self.entries.remove(&var_id);
            self.by_master.remove(&master);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Drop an entry with all its virtual subscriptions.
    pub fn remove_entry(&mut self, var_id: &VariableId) -> Result<(), DbError> {
        let entry = self
            .entries
            .remove(var_id)
            .ok_or_else(|| DbError::NoSuchVariable(var_id.clone()))?;
        self.by_master.remove(&entry.master_subs_id);
        for sub in &entry.virtuals {
            self.by_virtual.remove(&sub.id);
        }
        Ok(())
    }

    pub fn master_by_var(&self, var_id: &VariableId) -> Result<SubscriptionId, DbError> {
        self.entries
            .get(var_id)
            .map(|entry| entry.master_subs_id)
            .ok_or_else(|| DbError::NoSuchVariable(var_id.clone()))
    }

    pub fn master_by_virtual(
        &self,
        virtual_subs_id: SubscriptionId,
    ) -> Result<SubscriptionId, DbError> {
        let var_id = self
            .by_virtual
            .get(&virtual_subs_id)
            .ok_or(DbError::NoSuchVirtualSubscription(virtual_subs_id))?;
        self.master_by_var(var_id)
            .map_err(|_| DbError::NoSuchVirtualSubscription(virtual_subs_id))
    }

    /// Invoke the handler of every virtual subscription behind the given
    /// master subscription, in insertion order.
    pub fn invoke_handlers(
        &self,
        master_subs_id: SubscriptionId,
        value: &VariableValue,
    ) -> Result<(), DbError> {
        let var_id = self
            .by_master
            .get(&master_subs_id)
            .ok_or(DbError::NoSuchMasterSubscription(master_subs_id))?;
        let entry = self
            .entries
            .get(var_id)
            .ok_or(DbError::NoSuchMasterSubscription(master_subs_id))?;
        for sub in &entry.virtuals {
            (sub.handler)(&entry.var_id, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn var(name: &str) -> VariableId {
        VariableId::new("fsuipc/offset", name)
    }

    fn noop() -> VarUpdateHandler {
        Arc::new(|_, _| {})
    }

    #[test]
    fn entries_are_unique_per_variable_and_master() {
        let mut db = SubscriptionDb::new();
        db.create_entry(var("0x1000:1"), 100, noop()).unwrap();
        assert_eq!(
            db.create_entry(var("0x1000:1"), 101, noop()),
            Err(DbError::VariableAlreadyExists(var("0x1000:1")))
        );
        assert_eq!(
            db.create_entry(var("0x2000:1"), 100, noop()),
            Err(DbError::MasterSubscriptionAlreadyExists(100))
        );
    }

    #[test]
    fn virtuals_resolve_to_their_master() {
        let mut db = SubscriptionDb::new();
        let v1 = db.create_entry(var("0x1000:1"), 100, noop()).unwrap();
        let v2 = db.add_virtual_subscription(&var("0x1000:1"), noop()).unwrap();
        assert_ne!(v1, v2);
        assert_eq!(db.master_by_var(&var("0x1000:1")).unwrap(), 100);
        assert_eq!(db.master_by_virtual(v1).unwrap(), 100);
        assert_eq!(db.master_by_virtual(v2).unwrap(), 100);
        assert_eq!(
            db.master_by_virtual(9999),
            Err(DbError::NoSuchVirtualSubscription(9999))
        );
    }

    #[test]
    fn entry_survives_until_the_last_virtual_is_removed() {
        let mut db = SubscriptionDb::new();
        let v1 = db.create_entry(var("0x1000:1"), 100, noop()).unwrap();
        let v2 = db.add_virtual_subscription(&var("0x1000:1"), noop()).unwrap();
        let v3 = db.add_virtual_subscription(&var("0x1000:1"), noop()).unwrap();

        assert_eq!(db.remove_virtual_subscription(v1).unwrap(), false);
        assert_eq!(db.remove_virtual_subscription(v2).unwrap(), false);
        assert!(db.entry_defined(&var("0x1000:1")));
        assert_eq!(db.remove_virtual_subscription(v3).unwrap(), true);
        assert!(!db.entry_defined(&var("0x1000:1")));

        // Re-subscribing creates a fresh entry with a fresh virtual id.
        let v4 = db.create_entry(var("0x1000:1"), 101, noop()).unwrap();
        assert_ne!(v4, v1);
        assert_eq!(db.master_by_virtual(v4).unwrap(), 101);
    }

    #[test]
    fn remove_entry_drops_every_index() {
        let mut db = SubscriptionDb::new();
        let v1 = db.create_entry(var("0x1000:1"), 100, noop()).unwrap();
        let v2 = db.add_virtual_subscription(&var("0x1000:1"), noop()).unwrap();

        db.remove_entry(&var("0x1000:1")).unwrap();
        assert!(!db.entry_defined(&var("0x1000:1")));
        assert!(db.master_by_virtual(v1).is_err());
        assert!(db.master_by_virtual(v2).is_err());
        assert_eq!(
            db.invoke_handlers(100, &VariableValue::Byte(1)),
            Err(DbError::NoSuchMasterSubscription(100))
        );
    }

    #[test]
    fn handlers_run_in_insertion_order() {
        let mut db = SubscriptionDb::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in 1..=3 {
            let sink = seen.clone();
            let handler: VarUpdateHandler = Arc::new(move |_, value: &VariableValue| {
                sink.lock().unwrap().push((tag, *value));
            });
            if tag == 1 {
                db.create_entry(var("0x1000:1"), 100, handler).unwrap();
            } else {
                db.add_virtual_subscription(&var("0x1000:1"), handler).unwrap();
            }
        }

        db.invoke_handlers(100, &VariableValue::Byte(0x42)).unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                (1, VariableValue::Byte(0x42)),
                (2, VariableValue::Byte(0x42)),
                (3, VariableValue::Byte(0x42)),
            ]
        );
    }
}
