use crate::error::ClientError;
use flightvars_core::api::{SubscriptionId, VarUpdateHandler};
use flightvars_core::codec::VariableId;
use std::collections::HashMap;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// The writing half of a completion slot. Completing an abandoned slot
/// (the caller timed out and dropped the other half) is a no-op.
pub(crate) struct CompletionSlot<T> {
    tx: Sender<Result<T, ClientError>>,
}

impl<T> CompletionSlot<T> {
    pub(crate) fn complete(&self, result: Result<T, ClientError>) {
        let _ = self.tx.send(result);
    }
}

/// The waiting half of a completion slot. Blocks the caller thread until
/// the reactor completes the request or the deadline expires.
pub(crate) struct CompletionWait<T> {
    rx: Receiver<Result<T, ClientError>>,
}

impl<T> CompletionWait<T> {
    pub(crate) fn wait(self, timeout: Duration) -> Result<T, ClientError> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(ClientError::RequestTimeout),
            Err(RecvTimeoutError::Disconnected) => Err(ClientError::Communication(
                "the client reactor is gone".to_string(),
            )),
        }
    }
}

pub(crate) fn completion_slot<T>() -> (CompletionSlot<T>, CompletionWait<T>) {
    let (tx, rx) = channel();
    (CompletionSlot { tx }, CompletionWait { rx })
}

/// A subscription waiting for its reply from the server.
pub(crate) struct PendingSubscription {
    pub(crate) var_id: VariableId,
    pub(crate) handler: VarUpdateHandler,
    pub(crate) slot: CompletionSlot<SubscriptionId>,
}

/// An unsubscription waiting for its reply from the server.
pub(crate) struct PendingUnsubscription {
    pub(crate) master_subs_id: SubscriptionId,
    pub(crate) slot: CompletionSlot<()>,
}

/// Outbound requests that still await a server reply. Subscriptions are
/// keyed by variable, unsubscriptions by master subscription identifier; a
/// reply drains the whole list under its key. A request whose caller
/// already timed out stays here until the reply discards it.
#[derive(Default)]
pub(crate) struct RequestPool {
    subscriptions: HashMap<VariableId, Vec<PendingSubscription>>,
    unsubscriptions: HashMap<SubscriptionId, Vec<PendingUnsubscription>>,
}

impl RequestPool {
    pub(crate) fn new() -> RequestPool {
        RequestPool::default()
    }

    /// Queue a subscription request. Returns true when it is the first
    /// pending one for its variable, i.e. a wire request must be sent.
    pub(crate) fn insert_subscription(&mut self, request: PendingSubscription) -> bool {
        let pending = self.subscriptions.entry(request.var_id.clone()).or_default();
        pending.push(request);
        pending.len() == 1
    }

    pub(crate) fn pop_subscriptions(&mut self, var_id: &VariableId) -> Vec<PendingSubscription> {
        self.subscriptions.remove(var_id).unwrap_or_default()
    }

    /// Queue an unsubscription request. Returns true when it is the first
    /// pending one for its master subscription.
    pub(crate) fn insert_unsubscription(&mut self, request: PendingUnsubscription) -> bool {
        let pending = self
            .unsubscriptions
            .entry(request.master_subs_id)
            .or_default();
        pending.push(request);
        pending.len() == 1
    }

    pub(crate) fn pop_unsubscriptions(
        &mut self,
        master_subs_id: SubscriptionId,
    ) -> Vec<PendingUnsubscription> {
        self.unsubscriptions.remove(&master_subs_id).unwrap_or_default()
    }

    /// Complete every pending request with the given error.
    pub(crate) fn propagate_error(&mut self, error: &ClientError) {
        for (_, pending) in self.subscriptions.drain() {
            for request in pending {
                request.slot.complete(Err(error.clone()));
            }
        }
        for (_, pending) in self.unsubscriptions.drain() {
            for request in pending {
                request.slot.complete(Err(error.clone()));
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;

    fn var(name: &str) -> VariableId {
        VariableId::new("fsuipc/offset", name)
    }

    fn subscription(var_id: &VariableId) -> (PendingSubscription, CompletionWait<SubscriptionId>) {
        let (slot, wait) = completion_slot();
        (
            PendingSubscription {
                var_id: var_id.clone(),
                handler: Arc::new(|_, _| {}),
                slot,
            },
            wait,
        )
    }

    #[test]
    fn only_the_first_request_per_variable_triggers_a_send() {
        let mut pool = RequestPool::new();
        let (first, _w1) = subscription(&var("0x1000:1"));
        let (second, _w2) = subscription(&var("0x1000:1"));
        let (other, _w3) = subscription(&var("0x2000:1"));
        assert!(pool.insert_subscription(first));
        assert!(!pool.insert_subscription(second));
        assert!(pool.insert_subscription(other));

        assert_eq!(pool.pop_subscriptions(&var("0x1000:1")).len(), 2);
        assert!(pool.pop_subscriptions(&var("0x1000:1")).is_empty());
    }

    #[test]
    fn propagated_errors_reach_every_pending_request() {
        let mut pool = RequestPool::new();
        let (req, wait) = subscription(&var("0x1000:1"));
        pool.insert_subscription(req);
        let (slot, unsub_wait) = completion_slot();
        pool.insert_unsubscription(PendingUnsubscription {
            master_subs_id: 7,
            slot,
        });

        pool.propagate_error(&ClientError::Communication("boom".to_string()));
        assert_eq!(
            wait.wait(Duration::from_millis(100)),
            Err(ClientError::Communication("boom".to_string()))
        );
        assert_eq!(
            unsub_wait.wait(Duration::from_millis(100)),
            Err(ClientError::Communication("boom".to_string()))
        );
    }

    #[test]
    fn waiting_on_an_unanswered_slot_times_out() {
        let (_slot, wait) = completion_slot::<()>();
        assert_eq!(
            wait.wait(Duration::from_millis(10)),
            Err(ClientError::RequestTimeout)
        );
    }
}
