use flightvars_codec::{VariableGroup, VariableId, VariableValue};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Identifies one subscription. Issued by [`make_subscription_id`];
/// [`NO_SUBSCRIPTION`] is never a valid identifier.
pub type SubscriptionId = u32;

/// The reserved "none" subscription identifier.
pub const NO_SUBSCRIPTION: SubscriptionId = 0;

static NEXT_SUBSCRIPTION_ID: AtomicU32 = AtomicU32::new(1);

/// Obtain a fresh subscription identifier. Identifiers are unique across
/// the whole process, regardless of which component requested them.
pub fn make_subscription_id() -> SubscriptionId {
    NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed)
}

/// A callback invoked when a subscribed variable changes.
pub type VarUpdateHandler = Arc<dyn Fn(&VariableId, &VariableValue) + Send + Sync>;

/// An error raised by a [`FlightVars`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("no such variable with id {0}")]
    NoSuchVariable(VariableId),

    #[error("no such subscription with id {0}")]
    NoSuchSubscription(SubscriptionId),

    #[error("there is already a master registered for variable group {0}")]
    MasterAlreadyRegistered(VariableGroup),

    #[error("invalid value type {value_type} for subscription {subs_id}")]
    InvalidValueType {
        subs_id: SubscriptionId,
        value_type: String,
    },

    #[error("IO failure: {0}")]
    Io(String),
}

/// The FlightVars API. Implemented by every variable group master, and by
/// the router that multiplexes over them.
pub trait FlightVars: Send + Sync {
    /// Subscribe to a variable. The handler is invoked on every change of
    /// the variable value until the subscription is removed.
    fn subscribe(
        &self,
        var: &VariableId,
        handler: VarUpdateHandler,
    ) -> Result<SubscriptionId, ApiError>;

    /// Remove the subscription with the given identifier.
    fn unsubscribe(&self, id: SubscriptionId) -> Result<(), ApiError>;

    /// Replace the value of the variable behind the given subscription.
    fn update(&self, id: SubscriptionId, value: &VariableValue) -> Result<(), ApiError>;
}
