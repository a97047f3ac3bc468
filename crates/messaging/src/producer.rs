//! Typed event producer.

use std::sync::Arc;

use broker::{Delivery, Publisher};
use contracts::Event;

use crate::error::Result;

/// Serializes events to JSON and publishes them to their topic.
///
/// Stateless apart from the shared publisher; clone it freely. Publishing is
/// not retried: a failure goes back to the caller.
#[derive(Clone)]
pub struct EventProducer {
    publisher: Arc<dyn Publisher>,
}

impl EventProducer {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self { publisher }
    }

    /// Publishes `event` to `E::TOPIC` without a key.
    #[tracing::instrument(skip(self, event), fields(event_type = E::EVENT_TYPE, topic = E::TOPIC))]
    pub async fn publish<E: Event>(&self, event: &E) -> Result<Delivery> {
        let payload = serde_json::to_vec(event)?;

        match self.publisher.publish(E::TOPIC, payload).await {
            Ok(delivery) => {
                metrics::counter!("producer_published_total", "topic" => E::TOPIC).increment(1);
                tracing::debug!(%delivery, "event published");
                Ok(delivery)
            }
            Err(e) => {
                metrics::counter!("producer_publish_failures_total", "topic" => E::TOPIC)
                    .increment(1);
                tracing::error!(error = %e, "failed to publish event");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use broker::InMemoryBroker;
    use common::{ProductId, UserId};
    use contracts::{CartCheckedOut, CheckedOutItem, UserLoggedIn, topics};

    #[tokio::test]
    async fn test_publish_to_event_topic() {
        let broker = InMemoryBroker::new();
        let producer = EventProducer::new(Arc::new(broker.clone()));

        let event = UserLoggedIn {
            user_id: UserId::new(99),
            email: "alice@example.com".to_string(),
        };
        let delivery = producer.publish(&event).await.unwrap();

        assert_eq!(delivery.topic, topics::USER_EVENTS);
        assert_eq!(broker.decoded::<UserLoggedIn>(topics::USER_EVENTS), vec![event]);
    }

    #[tokio::test]
    async fn test_publish_failure_is_returned() {
        let broker = InMemoryBroker::new();
        broker.set_available(false);
        let producer = EventProducer::new(Arc::new(broker.clone()));

        let event = CartCheckedOut {
            user_id: UserId::new(5),
            items: vec![CheckedOutItem {
                product_id: ProductId::new(1),
                quantity: 2,
            }],
        };
        let result = producer.publish(&event).await;

        assert!(result.unwrap_err().is_publish_failure());
        assert!(broker.messages(topics::CART_EVENTS).is_empty());
        // One attempt, no retry.
        assert_eq!(broker.publish_attempts(), 1);
    }
}
