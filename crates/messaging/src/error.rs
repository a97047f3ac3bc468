//! Messaging error types.

use broker::BrokerError;
use domain::DomainError;
use thiserror::Error;

/// Errors that can occur while producing, consuming or coordinating events.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// Broker error.
    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The broker never answered the readiness probe.
    #[error("Broker not ready after {attempts} attempts")]
    BrokerNotReady { attempts: u32 },

    /// The operation was cancelled by shutdown.
    #[error("Operation cancelled")]
    Cancelled,

    /// A message handler failed.
    #[error("Handler error: {0}")]
    Handler(String),
}

impl MessagingError {
    /// Returns true if the underlying cause is a failed publish.
    pub fn is_publish_failure(&self) -> bool {
        matches!(
            self,
            MessagingError::Broker(
                BrokerError::PublishFailed { .. } | BrokerError::Unavailable { .. }
            )
        )
    }
}

/// Convenience type alias for messaging results.
pub type Result<T> = std::result::Result<T, MessagingError>;
