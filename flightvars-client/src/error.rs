use flightvars_core::api::SubscriptionId;
use flightvars_core::codec::VariableId;
use thiserror::Error;

/// An error surfaced by the public client API. Protocol and IO failures
/// are folded into [`ClientError::Communication`]; the domain errors keep
/// their own kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("no such variable {0}")]
    NoSuchVariable(VariableId),

    #[error("no such subscription {0}")]
    NoSuchSubscription(SubscriptionId),

    #[error("the request timed out")]
    RequestTimeout,

    #[error("communication error: {0}")]
    Communication(String),
}

impl ClientError {
    pub(crate) fn communication(cause: impl std::fmt::Display) -> ClientError {
        ClientError::Communication(cause.to_string())
    }
}
