use crate::error::BusError;
use crate::topic::{Pattern, Topic};
use crate::{Bus, MessageCallback, Qos, TopicMessage};
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::debug;

/// An in-process bus. Publications are delivered synchronously to every
/// matching subscriber, in subscription order, which trivially preserves
/// per-topic FIFO for a single publisher.
pub struct LocalBus {
    subscriptions: Mutex<Vec<(Pattern, MessageCallback)>>,
    connected: AtomicBool,
}

impl LocalBus {
    pub fn new() -> LocalBus {
        LocalBus {
            subscriptions: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
        }
    }
}

impl Default for LocalBus {
    fn default() -> LocalBus {
        LocalBus::new()
    }
}

impl Bus for LocalBus {
    fn publish(&self, topic: &Topic, payload: Bytes, _qos: Qos) -> Result<(), BusError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(BusError::Disconnected);
        }
        let targets: Vec<MessageCallback> = {
            let subscriptions = self.subscriptions.lock().unwrap();
            subscriptions
                .iter()
                .filter(|(pattern, _)| pattern.matches(topic))
                .map(|(_, callback)| callback.clone())
                .collect()
        };
        let message = TopicMessage {
            topic: topic.clone(),
            payload,
        };
        for callback in targets {
            callback(&message);
        }
        Ok(())
    }

    fn subscribe(
        &self,
        pattern: Pattern,
        _qos: Qos,
        callback: MessageCallback,
    ) -> Result<(), BusError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(BusError::Disconnected);
        }
        self.subscriptions.lock().unwrap().push((pattern, callback));
        Ok(())
    }

    fn disconnect(&self) -> Result<(), BusError> {
        debug!("disconnecting local bus");
        self.connected.store(false, Ordering::SeqCst);
        self.subscriptions.lock().unwrap().clear();
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn delivers_to_matching_subscribers_in_order() {
        let bus = LocalBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in &["first", "second"] {
            let seen = seen.clone();
            let tag = tag.to_string();
            bus.subscribe(
                Pattern::new("fsuipc/offsets/+").unwrap(),
                Qos::AtMostOnce,
                Arc::new(move |msg: &TopicMessage| {
                    seen.lock().unwrap().push((tag.clone(), msg.payload.clone()));
                }),
            )
            .unwrap();
        }
        bus.subscribe(
            Pattern::new("cockpit/#").unwrap(),
            Qos::AtMostOnce,
            Arc::new(|_| panic!("must not match")),
        )
        .unwrap();

        let topic = Topic::new("fsuipc/offsets/1000:2").unwrap();
        bus.publish(&topic, Bytes::from_static(b"\x01\x00\x34\x12"), Qos::AtMostOnce)
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, "first");
        assert_eq!(seen[1].0, "second");
    }

    #[test]
    fn per_topic_fifo_for_a_single_publisher() {
        let bus = LocalBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe(
            Pattern::new("t/#").unwrap(),
            Qos::AtMostOnce,
            Arc::new(move |msg: &TopicMessage| sink.lock().unwrap().push(msg.payload.clone())),
        )
        .unwrap();

        let topic = Topic::new("t/x").unwrap();
        for i in 0u8..10 {
            bus.publish(&topic, Bytes::copy_from_slice(&[i]), Qos::AtMostOnce)
                .unwrap();
        }
        let seen = seen.lock().unwrap();
        let order: Vec<u8> = seen.iter().map(|p| p[0]).collect();
        assert_eq!(order, (0..10).collect::<Vec<u8>>());
    }

    #[test]
    fn disconnected_bus_rejects_operations() {
        let bus = LocalBus::new();
        bus.disconnect().unwrap();
        let topic = Topic::new("t").unwrap();
        assert_eq!(
            bus.publish(&topic, Bytes::new(), Qos::AtMostOnce),
            Err(BusError::Disconnected)
        );
    }
}
