use async_trait::async_trait;

use crate::{Delivery, Message, Result};

/// Publishes raw payloads to named topics.
///
/// Implementations must be thread-safe; a single publisher is shared by every
/// producer in the process.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes a payload to `topic` and waits for the client's default
    /// acknowledgment.
    ///
    /// Publishing is never retried here: a failure is returned to the caller.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<Delivery>;
}

/// A broker that can also hand out subscriptions.
#[async_trait]
pub trait Broker: Publisher {
    /// Joins consumer group `group_id` on `topic`.
    ///
    /// Consumers sharing a group id share the topic's messages; distinct
    /// group ids each see every message. A group that has never committed
    /// progress starts at the earliest available offset.
    async fn subscribe(&self, topic: &str, group_id: &str) -> Result<Box<dyn Subscription>>;

    /// A display name for logs (bootstrap servers, or `in-memory`).
    fn name(&self) -> &str;
}

/// A stable `(topic, group)` membership that yields messages one at a time.
#[async_trait]
pub trait Subscription: Send {
    /// The subscribed topic.
    fn topic(&self) -> &str;

    /// The consumer group.
    fn group_id(&self) -> &str;

    /// Waits for the next message.
    ///
    /// Must be cancel-safe: dropping the returned future before it completes
    /// must not lose a message, so the poll loop can race it against a
    /// shutdown signal.
    async fn poll(&mut self) -> Result<Message>;

    /// Leaves the consumer group and releases the underlying connection.
    ///
    /// Polling afterwards fails with [`BrokerError::Closed`](crate::BrokerError::Closed).
    async fn unsubscribe(&mut self);
}
