//! Cancellation-aware topic consumer loop.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use broker::{Broker, BrokerError, Message, Subscription};
use contracts::Event;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::{MessagingError, Result};
use crate::readiness::ReadinessProbe;
use crate::state::ConsumerState;

/// Default wait after a transient broker error.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Handles one decoded event.
///
/// An error only affects the message being handled: it is logged and the
/// consumer moves on to the next message.
#[async_trait]
pub trait EventHandler<E: Event>: Send + Sync {
    async fn handle(&self, event: E) -> Result<()>;
}

/// A long-lived consumer of one topic within one consumer group.
///
/// Running it probes the broker, joins the group and dispatches messages one
/// at a time, in delivery order, to its handler:
/// - a payload that does not decode as `E` is logged and skipped;
/// - a handler error is logged and the message skipped;
/// - a transient poll error is logged, and polling resumes after the retry delay;
/// - any other poll error releases the subscription and ends the loop.
///
/// The loop checks the cancellation token on every iteration and while
/// waiting out a retry delay, and leaves the group on exit.
pub struct TopicConsumer<E, H> {
    group_id: String,
    broker: Arc<dyn Broker>,
    handler: H,
    probe: ReadinessProbe,
    retry_delay: Duration,
    state: watch::Sender<ConsumerState>,
    _event: PhantomData<fn() -> E>,
}

enum Recovery {
    Resumed,
    Cancelled,
}

impl<E, H> TopicConsumer<E, H>
where
    E: Event,
    H: EventHandler<E>,
{
    pub fn new(
        group_id: impl Into<String>,
        broker: Arc<dyn Broker>,
        handler: H,
        probe: ReadinessProbe,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            broker,
            handler,
            probe,
            retry_delay: DEFAULT_RETRY_DELAY,
            state: watch::Sender::new(ConsumerState::NotStarted),
            _event: PhantomData,
        }
    }

    /// Sets the wait after a transient broker error.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn topic(&self) -> &'static str {
        E::TOPIC
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// A handle observing this consumer's state.
    pub fn state(&self) -> watch::Receiver<ConsumerState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: ConsumerState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "consumer state changed");
        }
    }

    /// Runs the consumer until cancelled or until a fatal error.
    ///
    /// Returns `Ok(())` when cancelled, [`MessagingError::BrokerNotReady`] when
    /// the readiness probe gives up, and the poll error when it is fatal.
    #[tracing::instrument(skip_all, fields(topic = E::TOPIC, group_id = %self.group_id))]
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        self.set_state(ConsumerState::Probing);
        match self.probe.wait_until_ready(&cancel).await {
            Ok(_) => {}
            Err(MessagingError::Cancelled) => {
                self.set_state(ConsumerState::Stopped);
                return Ok(());
            }
            Err(e) => {
                tracing::error!(error = %e, "consumer disabled, broker never became ready");
                self.set_state(ConsumerState::Disabled);
                return Err(e);
            }
        }

        let mut subscription = loop {
            match self.broker.subscribe(E::TOPIC, &self.group_id).await {
                Ok(subscription) => break subscription,
                Err(e) if e.is_transient() => {
                    if let Recovery::Cancelled = self.recover(&e, &cancel).await {
                        self.set_state(ConsumerState::Stopped);
                        return Ok(());
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to subscribe");
                    self.set_state(ConsumerState::Faulted);
                    return Err(e.into());
                }
            }
        };

        self.set_state(ConsumerState::Consuming);
        tracing::info!("consumer started");

        let outcome = self.poll_loop(&mut subscription, &cancel).await;

        subscription.unsubscribe().await;
        match &outcome {
            Ok(()) => {
                self.set_state(ConsumerState::Stopped);
                tracing::info!("consumer stopped");
            }
            Err(e) => {
                self.set_state(ConsumerState::Faulted);
                tracing::error!(error = %e, "consumer faulted");
            }
        }
        outcome
    }

    async fn poll_loop(
        &self,
        subscription: &mut Box<dyn Subscription>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        loop {
            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                polled = subscription.poll() => polled,
            };

            match polled {
                Ok(message) => self.dispatch(message).await,
                Err(e) if e.is_transient() => {
                    if let Recovery::Cancelled = self.recover(&e, cancel).await {
                        return Ok(());
                    }
                    self.set_state(ConsumerState::Consuming);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn recover(&self, error: &BrokerError, cancel: &CancellationToken) -> Recovery {
        tracing::warn!(
            error = %error,
            "transient broker error, retrying in {:?}",
            self.retry_delay
        );
        self.set_state(ConsumerState::Recovering);

        tokio::select! {
            _ = cancel.cancelled() => Recovery::Cancelled,
            _ = tokio::time::sleep(self.retry_delay) => Recovery::Resumed,
        }
    }

    async fn dispatch(&self, message: Message) {
        metrics::counter!("consumer_messages_total", "topic" => E::TOPIC).increment(1);

        let event: E = match serde_json::from_slice(&message.payload) {
            Ok(event) => event,
            Err(e) => {
                metrics::counter!("consumer_message_errors_total", "topic" => E::TOPIC)
                    .increment(1);
                tracing::warn!(
                    offset = message.offset,
                    error = %e,
                    payload = %message.payload_lossy(),
                    "skipping message that is not a {}",
                    E::EVENT_TYPE
                );
                return;
            }
        };

        if let Err(e) = self.handler.handle(event).await {
            metrics::counter!("consumer_message_errors_total", "topic" => E::TOPIC).increment(1);
            tracing::error!(
                offset = message.offset,
                error = %e,
                "failed to handle {}",
                E::EVENT_TYPE
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readiness::RetryPolicy;
    use broker::{InMemoryBroker, PollFault, Publisher};
    use common::UserId;
    use contracts::{UserLoggedIn, topics};
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Recorder {
        seen: Arc<Mutex<Vec<UserId>>>,
        fail_for: Option<UserId>,
    }

    impl Recorder {
        fn seen(&self) -> Vec<UserId> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventHandler<UserLoggedIn> for Recorder {
        async fn handle(&self, event: UserLoggedIn) -> Result<()> {
            if self.fail_for == Some(event.user_id) {
                return Err(MessagingError::Handler("rejected".to_string()));
            }
            self.seen.lock().unwrap().push(event.user_id);
            Ok(())
        }
    }

    fn consumer(
        broker: &InMemoryBroker,
        recorder: Recorder,
        max_attempts: u32,
    ) -> TopicConsumer<UserLoggedIn, Recorder> {
        let probe = ReadinessProbe::new(
            Arc::new(broker.clone()),
            RetryPolicy {
                max_attempts,
                backoff: Duration::from_secs(3),
            },
        );
        TopicConsumer::new("cart-service", Arc::new(broker.clone()), recorder, probe)
    }

    async fn publish_login(broker: &InMemoryBroker, user_id: i32) {
        let event = UserLoggedIn {
            user_id: UserId::new(user_id),
            email: format!("user{user_id}@example.com"),
        };
        broker
            .publish(topics::USER_EVENTS, serde_json::to_vec(&event).unwrap())
            .await
            .unwrap();
    }

    async fn wait_for_state(
        state: &mut watch::Receiver<ConsumerState>,
        expected: ConsumerState,
    ) {
        tokio::time::timeout(
            Duration::from_secs(60),
            state.wait_for(|s| *s == expected),
        )
        .await
        .expect("state not reached")
        .unwrap();
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(60), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatches_in_order_and_stops_on_cancel() {
        let broker = InMemoryBroker::new();
        let recorder = Recorder::default();
        let consumer = consumer(&broker, recorder.clone(), 10);
        let mut state = consumer.state();
        let cancel = CancellationToken::new();

        publish_login(&broker, 1).await;
        publish_login(&broker, 2).await;
        let task = tokio::spawn(consumer.run(cancel.clone()));

        wait_until(|| recorder.seen().len() == 2).await;
        assert_eq!(recorder.seen(), vec![UserId::new(1), UserId::new(2)]);
        assert_eq!(*state.borrow_and_update(), ConsumerState::Consuming);
        assert_eq!(
            broker.active_subscriptions(topics::USER_EVENTS, "cart-service"),
            1
        );

        cancel.cancel();
        task.await.unwrap().unwrap();

        assert_eq!(*state.borrow(), ConsumerState::Stopped);
        assert_eq!(
            broker.active_subscriptions(topics::USER_EVENTS, "cart-service"),
            0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_payload_does_not_stop_the_loop() {
        let broker = InMemoryBroker::new();
        let recorder = Recorder::default();
        let cancel = CancellationToken::new();

        broker
            .publish(topics::USER_EVENTS, b"{not json".to_vec())
            .await
            .unwrap();
        broker
            .publish(topics::USER_EVENTS, br#"{"requestedId":"x"}"#.to_vec())
            .await
            .unwrap();
        publish_login(&broker, 3).await;

        let task = tokio::spawn(consumer(&broker, recorder.clone(), 10).run(cancel.clone()));

        wait_until(|| recorder.seen() == vec![UserId::new(3)]).await;
        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_error_skips_message() {
        let broker = InMemoryBroker::new();
        let recorder = Recorder {
            fail_for: Some(UserId::new(1)),
            ..Recorder::default()
        };
        let cancel = CancellationToken::new();

        publish_login(&broker, 1).await;
        publish_login(&broker, 2).await;

        let task = tokio::spawn(consumer(&broker, recorder.clone(), 10).run(cancel.clone()));

        wait_until(|| recorder.seen() == vec![UserId::new(2)]).await;
        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_poll_error_is_retried() {
        let broker = InMemoryBroker::new();
        let recorder = Recorder::default();
        let consumer = consumer(&broker, recorder.clone(), 10);
        let mut state = consumer.state();
        let cancel = CancellationToken::new();

        broker.inject_poll_fault(topics::USER_EVENTS, PollFault::UnknownTopicOrPartition);
        publish_login(&broker, 4).await;

        let started = tokio::time::Instant::now();
        let task = tokio::spawn(consumer.run(cancel.clone()));

        wait_for_state(&mut state, ConsumerState::Recovering).await;
        wait_until(|| recorder.seen() == vec![UserId::new(4)]).await;
        assert!(started.elapsed() >= DEFAULT_RETRY_DELAY);

        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_poll_error_faults_and_releases_subscription() {
        let broker = InMemoryBroker::new();
        let consumer = consumer(&broker, Recorder::default(), 10);
        let state = consumer.state();

        broker.inject_poll_fault(
            topics::USER_EVENTS,
            PollFault::Fatal("authorization failed".to_string()),
        );

        let result = consumer.run(CancellationToken::new()).await;

        assert!(matches!(
            result,
            Err(MessagingError::Broker(BrokerError::ConsumeFailed { .. }))
        ));
        assert_eq!(*state.borrow(), ConsumerState::Faulted);
        assert_eq!(
            broker.active_subscriptions(topics::USER_EVENTS, "cart-service"),
            0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_when_broker_never_ready() {
        let broker = InMemoryBroker::new();
        broker.set_available(false);
        let consumer = consumer(&broker, Recorder::default(), 3);
        let state = consumer.state();

        let result = consumer.run(CancellationToken::new()).await;

        assert!(matches!(
            result,
            Err(MessagingError::BrokerNotReady { attempts: 3 })
        ));
        assert_eq!(*state.borrow(), ConsumerState::Disabled);
        assert_eq!(
            broker.active_subscriptions(topics::USER_EVENTS, "cart-service"),
            0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_recovery() {
        let broker = InMemoryBroker::new();
        let consumer = consumer(&broker, Recorder::default(), 10)
            .with_retry_delay(Duration::from_secs(30));
        let mut state = consumer.state();
        let cancel = CancellationToken::new();

        broker.inject_poll_fault(topics::USER_EVENTS, PollFault::LeaderNotAvailable);
        let task = tokio::spawn(consumer.run(cancel.clone()));

        wait_for_state(&mut state, ConsumerState::Recovering).await;
        let started = tokio::time::Instant::now();
        cancel.cancel();
        task.await.unwrap().unwrap();

        assert!(started.elapsed() < Duration::from_secs(30));
        assert_eq!(*state.borrow(), ConsumerState::Stopped);
    }
}
