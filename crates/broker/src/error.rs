use thiserror::Error;

/// Errors that can occur when talking to the broker.
#[derive(Debug, Error)]
pub enum BrokerError {
    // Configuration errors (permanent)
    /// Required configuration variable is missing.
    #[error("Configuration missing: {var}")]
    ConfigMissing { var: String },

    /// Configuration value is invalid.
    #[error("Configuration invalid for {var}: {reason}")]
    ConfigInvalid { var: String, reason: String },

    // Transient errors: the poll loop waits and tries again
    /// The broker cannot be reached right now.
    #[error("Broker {broker} unavailable: {cause}")]
    Unavailable { broker: String, cause: String },

    /// The topic or one of its partitions has no leader at the moment.
    #[error("Topic {topic} unavailable: {cause}")]
    TopicUnavailable { topic: String, cause: String },

    /// Publishing a message failed.
    #[error("Failed to publish to topic {topic}: {cause}")]
    PublishFailed { topic: String, cause: String },

    /// Any other failure while consuming.
    #[error("Failed to consume from topic {topic}: {cause}")]
    ConsumeFailed { topic: String, cause: String },

    /// The subscription was released and can no longer be polled.
    #[error("Subscription to topic {topic} is closed")]
    Closed { topic: String },
}

impl BrokerError {
    /// Returns true if a poll failing with this error may be retried after a
    /// short delay.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BrokerError::Unavailable { .. } | BrokerError::TopicUnavailable { .. }
        )
    }

    /// Returns true if this is a configuration error.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            BrokerError::ConfigMissing { .. } | BrokerError::ConfigInvalid { .. }
        )
    }
}

/// Result type for broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;
