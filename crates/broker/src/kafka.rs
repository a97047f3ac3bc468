//! Kafka transport built on rdkafka.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rdkafka::Message as _;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::producer::{FutureProducer, FutureRecord};
use tracing::{debug, info, instrument};

use crate::{
    BrokerConfig, BrokerError, Delivery, Message, Result,
    transport::{Broker, Publisher, Subscription},
};

/// Kafka-backed broker.
///
/// A single producer is shared by every publisher of the node. Each
/// subscription gets its own consumer so group membership stays per
/// `(topic, group)`.
pub struct KafkaBroker {
    producer: FutureProducer,
    config: BrokerConfig,
}

impl KafkaBroker {
    /// Creates the shared producer. Connection is lazy, so this succeeds even
    /// when the broker is not up yet.
    pub fn new(config: BrokerConfig) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("client.id", &config.client_id)
            .set(
                "message.timeout.ms",
                config.message_timeout.as_millis().to_string(),
            )
            .create()
            .map_err(|e| BrokerError::Unavailable {
                broker: config.bootstrap_servers.clone(),
                cause: e.to_string(),
            })?;

        info!(
            bootstrap_servers = %config.bootstrap_servers,
            client_id = %config.client_id,
            "Kafka producer created"
        );

        Ok(Self { producer, config })
    }
}

#[async_trait]
impl Publisher for KafkaBroker {
    #[instrument(skip(self, payload), fields(payload_size = payload.len()))]
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<Delivery> {
        let record = FutureRecord::<(), [u8]>::to(topic).payload(&payload);

        let (partition, offset) = self
            .producer
            .send(record, self.config.message_timeout)
            .await
            .map_err(|(err, _)| classify_publish(topic, &self.config.bootstrap_servers, err))?;

        debug!(partition, offset, "Message delivered");

        Ok(Delivery {
            topic: topic.to_string(),
            partition,
            offset,
        })
    }
}

#[async_trait]
impl Broker for KafkaBroker {
    async fn subscribe(&self, topic: &str, group_id: &str) -> Result<Box<dyn Subscription>> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.config.bootstrap_servers)
            .set("client.id", &self.config.client_id)
            .set("group.id", group_id)
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "true")
            .set("session.timeout.ms", "30000")
            .create()
            .map_err(|e| BrokerError::Unavailable {
                broker: self.config.bootstrap_servers.clone(),
                cause: e.to_string(),
            })?;

        consumer
            .subscribe(&[topic])
            .map_err(|e| classify_consume(topic, &self.config.bootstrap_servers, e))?;

        info!(topic, group_id, "Kafka consumer subscribed");

        Ok(Box::new(KafkaSubscription {
            consumer,
            topic: topic.to_string(),
            group_id: group_id.to_string(),
            broker: self.config.bootstrap_servers.clone(),
            closed: false,
        }))
    }

    fn name(&self) -> &str {
        &self.config.bootstrap_servers
    }
}

struct KafkaSubscription {
    consumer: StreamConsumer,
    topic: String,
    group_id: String,
    broker: String,
    closed: bool,
}

#[async_trait]
impl Subscription for KafkaSubscription {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn group_id(&self) -> &str {
        &self.group_id
    }

    async fn poll(&mut self) -> Result<Message> {
        if self.closed {
            return Err(BrokerError::Closed {
                topic: self.topic.clone(),
            });
        }

        let borrowed = self
            .consumer
            .recv()
            .await
            .map_err(|e| classify_consume(&self.topic, &self.broker, e))?;

        let timestamp = borrowed
            .timestamp()
            .to_millis()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .unwrap_or_else(Utc::now);

        Ok(Message {
            topic: borrowed.topic().to_string(),
            partition: borrowed.partition(),
            offset: borrowed.offset(),
            timestamp,
            payload: borrowed.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        })
    }

    async fn unsubscribe(&mut self) {
        if !self.closed {
            self.consumer.unsubscribe();
            self.closed = true;
            debug!(topic = %self.topic, group_id = %self.group_id, "Kafka consumer unsubscribed");
        }
    }
}

fn classify_publish(topic: &str, broker: &str, err: KafkaError) -> BrokerError {
    match err.rdkafka_error_code() {
        Some(RDKafkaErrorCode::AllBrokersDown | RDKafkaErrorCode::BrokerTransportFailure) => {
            BrokerError::Unavailable {
                broker: broker.to_string(),
                cause: err.to_string(),
            }
        }
        _ => BrokerError::PublishFailed {
            topic: topic.to_string(),
            cause: err.to_string(),
        },
    }
}

/// Maps a consume error onto the transient/fatal split the poll loop uses.
fn classify_consume(topic: &str, broker: &str, err: KafkaError) -> BrokerError {
    match err.rdkafka_error_code() {
        Some(
            RDKafkaErrorCode::UnknownTopicOrPartition
            | RDKafkaErrorCode::UnknownTopic
            | RDKafkaErrorCode::LeaderNotAvailable,
        ) => BrokerError::TopicUnavailable {
            topic: topic.to_string(),
            cause: err.to_string(),
        },
        Some(RDKafkaErrorCode::AllBrokersDown | RDKafkaErrorCode::BrokerTransportFailure) => {
            BrokerError::Unavailable {
                broker: broker.to_string(),
                cause: err.to_string(),
            }
        }
        _ => BrokerError::ConsumeFailed {
            topic: topic.to_string(),
            cause: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_creation_is_lazy() {
        let broker = KafkaBroker::new(BrokerConfig::new("localhost:9092"));
        assert!(broker.is_ok());
        assert_eq!(broker.unwrap().name(), "localhost:9092");
    }

    #[test]
    fn test_missing_topic_is_transient() {
        let err = KafkaError::MessageConsumption(RDKafkaErrorCode::UnknownTopicOrPartition);
        let classified = classify_consume("cart-events", "localhost:9092", err);
        assert!(matches!(classified, BrokerError::TopicUnavailable { .. }));
        assert!(classified.is_transient());
    }

    #[test]
    fn test_leader_not_available_is_transient() {
        let err = KafkaError::MessageConsumption(RDKafkaErrorCode::LeaderNotAvailable);
        assert!(classify_consume("cart-events", "localhost:9092", err).is_transient());
    }

    #[test]
    fn test_other_consume_errors_are_fatal() {
        let err = KafkaError::MessageConsumption(RDKafkaErrorCode::TopicAuthorizationFailed);
        let classified = classify_consume("cart-events", "localhost:9092", err);
        assert!(matches!(classified, BrokerError::ConsumeFailed { .. }));
        assert!(!classified.is_transient());
    }

    #[test]
    fn test_publish_timeout_is_publish_failure() {
        let err = KafkaError::MessageProduction(RDKafkaErrorCode::MessageTimedOut);
        assert!(matches!(
            classify_publish("user-events", "localhost:9092", err),
            BrokerError::PublishFailed { .. }
        ));
    }
}
