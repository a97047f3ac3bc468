//! Supervision of the consumer tasks.

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::{Id, JoinSet};
use tokio_util::sync::CancellationToken;

use contracts::Event;

use crate::consumer::{EventHandler, TopicConsumer};
use crate::error::{MessagingError, Result};
use crate::state::ConsumerState;

/// Point-in-time state of one consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsumerStatus {
    pub group_id: String,
    pub topic: &'static str,
    pub state: ConsumerState,
}

#[derive(Clone)]
struct Tracked {
    group_id: String,
    topic: &'static str,
    state: watch::Receiver<ConsumerState>,
}

/// Read-only view of every consumer's state, cheap to clone.
#[derive(Clone, Default)]
pub struct ConsumerStatuses {
    tracked: Vec<Tracked>,
}

impl ConsumerStatuses {
    /// Current state of each consumer, in spawn order.
    pub fn snapshot(&self) -> Vec<ConsumerStatus> {
        self.tracked
            .iter()
            .map(|t| ConsumerStatus {
                group_id: t.group_id.clone(),
                topic: t.topic,
                state: *t.state.borrow(),
            })
            .collect()
    }

    /// True when no consumer has faulted or been disabled.
    pub fn all_healthy(&self) -> bool {
        self.tracked.iter().all(|t| t.state.borrow().is_healthy())
    }

    /// True when any consumer stopped on a fatal broker error.
    pub fn any_faulted(&self) -> bool {
        self.tracked
            .iter()
            .any(|t| *t.state.borrow() == ConsumerState::Faulted)
    }

    /// State of the consumer in `group_id`, if there is one.
    pub fn state_of(&self, group_id: &str) -> Option<ConsumerState> {
        self.tracked
            .iter()
            .find(|t| t.group_id == group_id)
            .map(|t| *t.state.borrow())
    }
}

/// Runs each consumer as its own task under a shared cancellation token.
///
/// A disabled consumer is logged and left down while the others keep
/// running. A faulted consumer also trips the fault signal, which the host
/// process watches to exit and be restarted.
pub struct ConsumerRuntime {
    cancel: CancellationToken,
    fault: CancellationToken,
    tasks: JoinSet<Result<()>>,
    groups: HashMap<Id, String>,
    statuses: ConsumerStatuses,
}

impl ConsumerRuntime {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            fault: CancellationToken::new(),
            tasks: JoinSet::new(),
            groups: HashMap::new(),
            statuses: ConsumerStatuses::default(),
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancelled once any consumer has faulted.
    pub fn fault_signal(&self) -> CancellationToken {
        self.fault.clone()
    }

    /// Spawns `consumer` on the current runtime.
    pub fn spawn<E, H>(&mut self, consumer: TopicConsumer<E, H>)
    where
        E: Event,
        H: EventHandler<E> + 'static,
    {
        let group_id = consumer.group_id().to_string();
        let state = consumer.state();
        self.statuses.tracked.push(Tracked {
            group_id: group_id.clone(),
            topic: consumer.topic(),
            state: state.clone(),
        });

        let cancel = self.cancel.clone();
        let fault = self.fault.clone();
        let task_group = group_id.clone();
        let handle = self.tasks.spawn(async move {
            let outcome = consumer.run(cancel).await;
            if let Err(e) = &outcome {
                tracing::error!(group_id = %task_group, error = %e, "consumer ended");
            }
            if *state.borrow() == ConsumerState::Faulted {
                fault.cancel();
            }
            outcome
        });
        self.groups.insert(handle.id(), group_id);
    }

    pub fn statuses(&self) -> ConsumerStatuses {
        self.statuses.clone()
    }

    pub fn len(&self) -> usize {
        self.statuses.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.tracked.is_empty()
    }

    /// Cancels every consumer and waits for all of them to finish.
    ///
    /// Returns each consumer's outcome by group id; a panicked task is
    /// reported as a handler error.
    pub async fn shutdown(mut self) -> Vec<(String, Result<()>)> {
        self.cancel.cancel();

        let mut outcomes = Vec::with_capacity(self.len());
        while let Some(joined) = self.tasks.join_next_with_id().await {
            match joined {
                Ok((id, outcome)) => outcomes.push((self.group_of(id), outcome)),
                Err(e) => {
                    let group_id = self.group_of(e.id());
                    tracing::error!(group_id = %group_id, error = %e, "consumer task panicked");
                    outcomes.push((group_id, Err(MessagingError::Handler(e.to_string()))));
                }
            }
        }

        tracing::info!(consumers = outcomes.len(), "consumer runtime stopped");
        outcomes
    }

    fn group_of(&mut self, id: Id) -> String {
        self.groups
            .remove(&id)
            .unwrap_or_else(|| format!("task-{id}"))
    }
}
