//! Broker connection configuration.

use std::env;
use std::time::Duration;

use crate::{BrokerError, Result};

const DEFAULT_CLIENT_ID: &str = "shop-node";
const DEFAULT_MESSAGE_TIMEOUT_MS: u64 = 5000;

/// Connection settings shared by every producer and consumer of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Comma-separated list of broker addresses.
    pub bootstrap_servers: String,
    /// Client identifier.
    pub client_id: String,
    /// How long a publish may wait for the broker's acknowledgment.
    pub message_timeout: Duration,
}

impl BrokerConfig {
    /// Creates a configuration with default client id and timeout.
    pub fn new(bootstrap_servers: impl Into<String>) -> Self {
        Self {
            bootstrap_servers: bootstrap_servers.into(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            message_timeout: Duration::from_millis(DEFAULT_MESSAGE_TIMEOUT_MS),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `KAFKA_BOOTSTRAP_SERVERS`: Comma-separated broker list
    ///
    /// Optional:
    /// - `KAFKA_CLIENT_ID`: Client identifier (default: "shop-node")
    /// - `KAFKA_MESSAGE_TIMEOUT_MS`: Publish acknowledgment timeout (default: 5000)
    pub fn from_env() -> Result<Self> {
        let bootstrap_servers =
            env::var("KAFKA_BOOTSTRAP_SERVERS").map_err(|_| BrokerError::ConfigMissing {
                var: "KAFKA_BOOTSTRAP_SERVERS".to_string(),
            })?;

        Self::from_parts(
            bootstrap_servers,
            env::var("KAFKA_CLIENT_ID").ok(),
            env::var("KAFKA_MESSAGE_TIMEOUT_MS").ok(),
        )
    }

    fn from_parts(
        bootstrap_servers: String,
        client_id: Option<String>,
        message_timeout_ms: Option<String>,
    ) -> Result<Self> {
        if bootstrap_servers.trim().is_empty() {
            return Err(BrokerError::ConfigInvalid {
                var: "KAFKA_BOOTSTRAP_SERVERS".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        let message_timeout = match message_timeout_ms {
            Some(raw) => {
                let ms: u64 = raw.parse().map_err(|_| BrokerError::ConfigInvalid {
                    var: "KAFKA_MESSAGE_TIMEOUT_MS".to_string(),
                    reason: format!("not a number of milliseconds: {raw}"),
                })?;
                Duration::from_millis(ms)
            }
            None => Duration::from_millis(DEFAULT_MESSAGE_TIMEOUT_MS),
        };

        Ok(Self {
            bootstrap_servers,
            client_id: client_id.unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string()),
            message_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BrokerConfig::from_parts("localhost:9092".to_string(), None, None).unwrap();

        assert_eq!(config, BrokerConfig::new("localhost:9092"));
        assert_eq!(config.client_id, "shop-node");
        assert_eq!(config.message_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_overrides() {
        let config = BrokerConfig::from_parts(
            "kafka-1:9092,kafka-2:9092".to_string(),
            Some("cart-node".to_string()),
            Some("1500".to_string()),
        )
        .unwrap();

        assert_eq!(config.client_id, "cart-node");
        assert_eq!(config.message_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_invalid_timeout() {
        let result = BrokerConfig::from_parts(
            "localhost:9092".to_string(),
            None,
            Some("soon".to_string()),
        );

        match result {
            Err(BrokerError::ConfigInvalid { var, .. }) => {
                assert_eq!(var, "KAFKA_MESSAGE_TIMEOUT_MS")
            }
            other => panic!("Expected ConfigInvalid, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_servers_rejected() {
        let result = BrokerConfig::from_parts("  ".to_string(), None, None);
        assert!(result.unwrap_err().is_config_error());
    }
}
