use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use tokio::sync::watch;

use crate::{
    BrokerError, Delivery, Message, Result,
    transport::{Broker, Publisher, Subscription},
};

const BROKER_NAME: &str = "in-memory";

/// A poll failure queued for a topic, for exercising consumer error paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollFault {
    /// Unknown topic or partition.
    UnknownTopicOrPartition,
    /// The partition has no leader right now.
    LeaderNotAvailable,
    /// Any other consume error.
    Fatal(String),
}

impl PollFault {
    fn into_error(self, topic: &str) -> BrokerError {
        match self {
            PollFault::UnknownTopicOrPartition => BrokerError::TopicUnavailable {
                topic: topic.to_string(),
                cause: "unknown topic or partition".to_string(),
            },
            PollFault::LeaderNotAvailable => BrokerError::TopicUnavailable {
                topic: topic.to_string(),
                cause: "leader not available".to_string(),
            },
            PollFault::Fatal(cause) => BrokerError::ConsumeFailed {
                topic: topic.to_string(),
                cause,
            },
        }
    }
}

type GroupKey = (String, String);

#[derive(Debug)]
struct State {
    topics: HashMap<String, Vec<Message>>,
    cursors: HashMap<GroupKey, usize>,
    members: HashMap<GroupKey, usize>,
    poll_faults: HashMap<String, VecDeque<PollFault>>,
    available: bool,
    failing_publishes: u32,
    publish_attempts: u64,
}

impl Default for State {
    fn default() -> Self {
        Self {
            topics: HashMap::new(),
            cursors: HashMap::new(),
            members: HashMap::new(),
            poll_faults: HashMap::new(),
            available: true,
            failing_publishes: 0,
            publish_attempts: 0,
        }
    }
}

#[derive(Debug)]
struct Shared {
    state: Mutex<State>,
    published: watch::Sender<u64>,
}

/// In-memory broker for tests and single-process deployments.
///
/// Each topic is a single-partition append-only log. Every consumer group
/// keeps its own offset, so distinct groups each see every message while
/// members of one group share progress. New groups start at the earliest
/// offset. Pollers are woken through a watch channel bumped on every publish.
///
/// Availability and poll failures can be injected to exercise the readiness
/// probe and the consumer's error classification.
#[derive(Debug, Clone)]
pub struct InMemoryBroker {
    shared: Arc<Shared>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                published: watch::Sender::new(0),
            }),
        }
    }
}

impl InMemoryBroker {
    /// Creates an empty broker that accepts connections.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes the broker reachable or unreachable. While unreachable every
    /// publish and poll fails with [`BrokerError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.state().available = available;
    }

    /// Makes the next `count` publishes fail, as a broker still starting up.
    pub fn fail_next_publishes(&self, count: u32) {
        self.state().failing_publishes = count;
    }

    /// Queues a failure returned by the next poll on `topic`, whichever group
    /// polls first.
    pub fn inject_poll_fault(&self, topic: &str, fault: PollFault) {
        self.state()
            .poll_faults
            .entry(topic.to_string())
            .or_default()
            .push_back(fault);
        // Wake pollers already parked on an empty topic.
        self.shared.published.send_modify(|seq| *seq += 1);
    }

    /// Number of publish calls seen so far, including failed ones.
    pub fn publish_attempts(&self) -> u64 {
        self.state().publish_attempts
    }

    /// All messages published to `topic`, in offset order.
    pub fn messages(&self, topic: &str) -> Vec<Message> {
        self.state().topics.get(topic).cloned().unwrap_or_default()
    }

    /// Decodes every message on `topic` as `T`, skipping payloads of another
    /// shape.
    pub fn decoded<T: DeserializeOwned>(&self, topic: &str) -> Vec<T> {
        self.messages(topic)
            .iter()
            .filter_map(|m| serde_json::from_slice(&m.payload).ok())
            .collect()
    }

    /// Number of live subscriptions for a `(topic, group)` pair.
    pub fn active_subscriptions(&self, topic: &str, group_id: &str) -> usize {
        self.state()
            .members
            .get(&(topic.to_string(), group_id.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// The next offset a group will read from `topic`.
    pub fn committed_offset(&self, topic: &str, group_id: &str) -> usize {
        self.state()
            .cursors
            .get(&(topic.to_string(), group_id.to_string()))
            .copied()
            .unwrap_or(0)
    }

    fn next_message(&self, topic: &str, group_id: &str) -> Result<Option<Message>> {
        let mut state = self.state();

        if !state.available {
            return Err(BrokerError::Unavailable {
                broker: BROKER_NAME.to_string(),
                cause: "broker is not accepting connections".to_string(),
            });
        }

        if let Some(fault) = state
            .poll_faults
            .get_mut(topic)
            .and_then(VecDeque::pop_front)
        {
            return Err(fault.into_error(topic));
        }

        let State {
            topics, cursors, ..
        } = &mut *state;
        let log = topics.get(topic).map(Vec::as_slice).unwrap_or_default();
        let cursor = cursors
            .entry((topic.to_string(), group_id.to_string()))
            .or_insert(0);

        match log.get(*cursor) {
            Some(message) => {
                *cursor += 1;
                Ok(Some(message.clone()))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Publisher for InMemoryBroker {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<Delivery> {
        let delivery = {
            let mut state = self.state();
            state.publish_attempts += 1;

            if !state.available {
                return Err(BrokerError::Unavailable {
                    broker: BROKER_NAME.to_string(),
                    cause: "broker is not accepting connections".to_string(),
                });
            }

            if state.failing_publishes > 0 {
                state.failing_publishes -= 1;
                return Err(BrokerError::PublishFailed {
                    topic: topic.to_string(),
                    cause: "broker not ready".to_string(),
                });
            }

            let log = state.topics.entry(topic.to_string()).or_default();
            let offset = log.len() as i64;
            log.push(Message {
                topic: topic.to_string(),
                partition: 0,
                offset,
                timestamp: Utc::now(),
                payload,
            });

            Delivery {
                topic: topic.to_string(),
                partition: 0,
                offset,
            }
        };

        self.shared.published.send_modify(|seq| *seq += 1);
        tracing::trace!(%delivery, "message appended");

        Ok(delivery)
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn subscribe(&self, topic: &str, group_id: &str) -> Result<Box<dyn Subscription>> {
        {
            let mut state = self.state();
            if !state.available {
                return Err(BrokerError::Unavailable {
                    broker: BROKER_NAME.to_string(),
                    cause: "broker is not accepting connections".to_string(),
                });
            }
            *state
                .members
                .entry((topic.to_string(), group_id.to_string()))
                .or_insert(0) += 1;
        }

        tracing::debug!(topic, group_id, "subscribed");

        Ok(Box::new(InMemorySubscription {
            broker: self.clone(),
            topic: topic.to_string(),
            group_id: group_id.to_string(),
            published: self.shared.published.subscribe(),
            closed: false,
        }))
    }

    fn name(&self) -> &str {
        BROKER_NAME
    }
}

struct InMemorySubscription {
    broker: InMemoryBroker,
    topic: String,
    group_id: String,
    published: watch::Receiver<u64>,
    closed: bool,
}

#[async_trait]
impl Subscription for InMemorySubscription {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn group_id(&self) -> &str {
        &self.group_id
    }

    async fn poll(&mut self) -> Result<Message> {
        loop {
            if self.closed {
                return Err(BrokerError::Closed {
                    topic: self.topic.clone(),
                });
            }

            // Mark the current sequence as seen before looking, so a publish
            // racing with the check still wakes us below.
            self.published.borrow_and_update();

            if let Some(message) = self.broker.next_message(&self.topic, &self.group_id)? {
                return Ok(message);
            }

            if self.published.changed().await.is_err() {
                return Err(BrokerError::Closed {
                    topic: self.topic.clone(),
                });
            }
        }
    }

    async fn unsubscribe(&mut self) {
        self.release();
    }
}

impl InMemorySubscription {
    fn release(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let key = (self.topic.clone(), self.group_id.clone());
        let mut state = self.broker.state();
        if let Some(count) = state.members.get_mut(&key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                state.members.remove(&key);
            }
        }
        tracing::debug!(topic = %self.topic, group_id = %self.group_id, "unsubscribed");
    }
}

impl Drop for InMemorySubscription {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn publish_str(broker: &InMemoryBroker, topic: &str, payload: &str) -> Delivery {
        broker
            .publish(topic, payload.as_bytes().to_vec())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn publish_assigns_sequential_offsets() {
        let broker = InMemoryBroker::new();

        let first = publish_str(&broker, "cart-events", "a").await;
        let second = publish_str(&broker, "cart-events", "b").await;
        let other = publish_str(&broker, "user-events", "c").await;

        assert_eq!(first.offset, 0);
        assert_eq!(second.offset, 1);
        assert_eq!(other.offset, 0);
        assert_eq!(broker.messages("cart-events").len(), 2);
    }

    #[tokio::test]
    async fn new_group_starts_at_earliest_offset() {
        let broker = InMemoryBroker::new();
        publish_str(&broker, "user-events", "before").await;

        let mut sub = broker.subscribe("user-events", "cart-service").await.unwrap();
        let message = sub.poll().await.unwrap();

        assert_eq!(message.payload_lossy(), "before");
        assert_eq!(broker.committed_offset("user-events", "cart-service"), 1);
    }

    #[tokio::test]
    async fn distinct_groups_each_see_every_message() {
        let broker = InMemoryBroker::new();
        let mut invoice = broker.subscribe("cart-events", "invoice-service").await.unwrap();
        let mut catalog = broker.subscribe("cart-events", "product-service").await.unwrap();

        publish_str(&broker, "cart-events", "checkout").await;

        assert_eq!(invoice.poll().await.unwrap().offset, 0);
        assert_eq!(catalog.poll().await.unwrap().offset, 0);
    }

    #[tokio::test]
    async fn members_of_one_group_share_progress() {
        let broker = InMemoryBroker::new();
        let mut first = broker.subscribe("cart-events", "invoice-service").await.unwrap();
        let mut second = broker.subscribe("cart-events", "invoice-service").await.unwrap();

        publish_str(&broker, "cart-events", "one").await;
        publish_str(&broker, "cart-events", "two").await;

        assert_eq!(first.poll().await.unwrap().offset, 0);
        assert_eq!(second.poll().await.unwrap().offset, 1);
    }

    #[tokio::test]
    async fn poll_wakes_on_publish() {
        let broker = InMemoryBroker::new();
        let mut sub = broker.subscribe("user-events", "cart-service").await.unwrap();

        let publisher = broker.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            publisher
                .publish("user-events", b"late".to_vec())
                .await
                .unwrap();
        });

        let message = tokio::time::timeout(Duration::from_secs(2), sub.poll())
            .await
            .expect("poll should wake up")
            .unwrap();
        assert_eq!(message.payload_lossy(), "late");
    }

    #[tokio::test]
    async fn cancelled_poll_does_not_lose_messages() {
        let broker = InMemoryBroker::new();
        let mut sub = broker.subscribe("user-events", "cart-service").await.unwrap();

        let timed_out = tokio::time::timeout(Duration::from_millis(10), sub.poll()).await;
        assert!(timed_out.is_err());

        publish_str(&broker, "user-events", "kept").await;
        assert_eq!(sub.poll().await.unwrap().payload_lossy(), "kept");
    }

    #[tokio::test]
    async fn unavailable_broker_rejects_publish_and_poll() {
        let broker = InMemoryBroker::new();
        let mut sub = broker.subscribe("user-events", "cart-service").await.unwrap();
        broker.set_available(false);

        let publish = broker.publish("health-check", b"ping".to_vec()).await;
        assert!(matches!(publish, Err(BrokerError::Unavailable { .. })));

        let poll = sub.poll().await;
        assert!(poll.unwrap_err().is_transient());

        broker.set_available(true);
        assert!(broker.publish("health-check", b"ping".to_vec()).await.is_ok());
        assert_eq!(broker.publish_attempts(), 2);
    }

    #[tokio::test]
    async fn failing_publishes_recover_after_count() {
        let broker = InMemoryBroker::new();
        broker.fail_next_publishes(2);

        assert!(broker.publish("health-check", b"ping".to_vec()).await.is_err());
        assert!(broker.publish("health-check", b"ping".to_vec()).await.is_err());
        assert!(broker.publish("health-check", b"ping".to_vec()).await.is_ok());
    }

    #[tokio::test]
    async fn injected_faults_are_returned_once_in_order() {
        let broker = InMemoryBroker::new();
        broker.inject_poll_fault("cart-events", PollFault::LeaderNotAvailable);
        broker.inject_poll_fault("cart-events", PollFault::Fatal("boom".to_string()));
        publish_str(&broker, "cart-events", "after").await;

        let mut sub = broker.subscribe("cart-events", "invoice-service").await.unwrap();

        assert!(sub.poll().await.unwrap_err().is_transient());
        assert!(matches!(
            sub.poll().await,
            Err(BrokerError::ConsumeFailed { .. })
        ));
        assert_eq!(sub.poll().await.unwrap().payload_lossy(), "after");
    }

    #[tokio::test]
    async fn injected_fault_wakes_parked_poller() {
        let broker = InMemoryBroker::new();
        let mut sub = broker.subscribe("user-events", "cart-service").await.unwrap();

        let injector = broker.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            injector.inject_poll_fault("user-events", PollFault::Fatal("boom".to_string()));
        });

        let polled = tokio::time::timeout(Duration::from_secs(1), sub.poll())
            .await
            .expect("poller was not woken");
        assert!(matches!(polled, Err(BrokerError::ConsumeFailed { .. })));
    }

    #[tokio::test]
    async fn unsubscribe_releases_membership() {
        let broker = InMemoryBroker::new();
        let mut sub = broker.subscribe("user-events", "cart-service").await.unwrap();
        assert_eq!(broker.active_subscriptions("user-events", "cart-service"), 1);

        sub.unsubscribe().await;

        assert_eq!(broker.active_subscriptions("user-events", "cart-service"), 0);
        assert!(matches!(sub.poll().await, Err(BrokerError::Closed { .. })));
    }

    #[tokio::test]
    async fn dropping_a_subscription_releases_membership() {
        let broker = InMemoryBroker::new();
        let sub = broker.subscribe("user-events", "cart-service").await.unwrap();
        drop(sub);

        assert_eq!(broker.active_subscriptions("user-events", "cart-service"), 0);
    }

    #[tokio::test]
    async fn decoded_skips_foreign_payloads() {
        let broker = InMemoryBroker::new();
        publish_str(&broker, "cart-events", r#"{"value":1}"#).await;
        publish_str(&broker, "cart-events", "not json").await;

        #[derive(serde::Deserialize)]
        struct Value {
            value: i32,
        }

        let values: Vec<Value> = broker.decoded("cart-events");
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].value, 1);
    }
}
