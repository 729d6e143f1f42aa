mod error;
mod local;
mod topic;

pub use error::BusError;
pub use local::LocalBus;
pub use topic::{Pattern, Topic};

use bytes::Bytes;
use std::sync::Arc;

/// Delivery guarantee hint. The FlightVars core only requires level 0;
/// bus implementations may honor the stronger levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qos {
    /// 0, fire and forget
    AtMostOnce,
    /// 1, acknowledged delivery
    AtLeastOnce,
    /// 2, assured delivery
    ExactlyOnce,
}

/// A message delivered to a bus subscriber.
#[derive(Debug, Clone)]
pub struct TopicMessage {
    pub topic: Topic,
    pub payload: Bytes,
}

pub type MessageCallback = Arc<dyn Fn(&TopicMessage) + Send + Sync>;

/// A duplex publish/subscribe channel carrying topic messages.
///
/// Ordering across topics is unspecified; messages published on one topic
/// by a single publisher are delivered FIFO.
pub trait Bus: Send + Sync {
    fn publish(&self, topic: &Topic, payload: Bytes, qos: Qos) -> Result<(), BusError>;

    fn subscribe(
        &self,
        pattern: Pattern,
        qos: Qos,
        callback: MessageCallback,
    ) -> Result<(), BusError>;

    fn disconnect(&self) -> Result<(), BusError>;
}
