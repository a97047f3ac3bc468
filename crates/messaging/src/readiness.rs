//! Startup readiness probe.

use std::sync::Arc;
use std::time::Duration;

use broker::Publisher;
use contracts::topics;
use tokio_util::sync::CancellationToken;

use crate::error::{MessagingError, Result};

/// How often to retry the probe and how long to wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            backoff: Duration::from_secs(3),
        }
    }
}

/// Publishes a ping to the health-check topic until the broker accepts it.
///
/// Used as a startup gate before a consumer subscribes; it is not a liveness
/// check.
#[derive(Clone)]
pub struct ReadinessProbe {
    publisher: Arc<dyn Publisher>,
    policy: RetryPolicy,
}

impl ReadinessProbe {
    pub fn new(publisher: Arc<dyn Publisher>, policy: RetryPolicy) -> Self {
        Self { publisher, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Pings until the broker accepts a publish.
    ///
    /// Returns the number of attempts it took. Fails with
    /// [`MessagingError::BrokerNotReady`] once the attempt budget is spent,
    /// or [`MessagingError::Cancelled`] if `cancel` fires first.
    #[tracing::instrument(skip(self, cancel), fields(max_attempts = self.policy.max_attempts))]
    pub async fn wait_until_ready(&self, cancel: &CancellationToken) -> Result<u32> {
        for attempt in 1..=self.policy.max_attempts {
            if cancel.is_cancelled() {
                return Err(MessagingError::Cancelled);
            }

            metrics::counter!("readiness_probe_attempts_total").increment(1);

            match self
                .publisher
                .publish(topics::HEALTH_CHECK, topics::HEALTH_CHECK_PING.as_bytes().to_vec())
                .await
            {
                Ok(_) => {
                    tracing::info!(attempt, "broker is ready");
                    return Ok(attempt);
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        error = %e,
                        "broker not ready, retrying in {:?}",
                        self.policy.backoff
                    );
                }
            }

            if attempt < self.policy.max_attempts {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(MessagingError::Cancelled),
                    _ = tokio::time::sleep(self.policy.backoff) => {}
                }
            }
        }

        tracing::error!(
            attempts = self.policy.max_attempts,
            "broker did not become ready, giving up"
        );
        Err(MessagingError::BrokerNotReady {
            attempts: self.policy.max_attempts,
        })
    }
}
