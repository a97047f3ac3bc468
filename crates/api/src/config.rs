//! Application configuration loaded from environment variables.

use std::collections::BTreeSet;
use std::time::Duration;

use messaging::{ExistenceMode, NodeConfig, RetryPolicy, ServiceRole};

/// Server and node configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `SERVICE_ROLES`: comma list of `cart,catalog,invoice,user` (default: all)
/// - `EXISTENCE_CHECK`: `direct` or `correlated` (default: `direct`)
/// - `EXISTENCE_TIMEOUT_MS`: correlated existence wait (default: `5000`)
/// - `PROBE_MAX_ATTEMPTS`: readiness probe attempts (default: `10`)
/// - `PROBE_BACKOFF_MS`: wait between probe attempts (default: `3000`)
/// - `CONSUMER_RETRY_DELAY_MS`: wait after a transient broker error (default: `5000`)
///
/// Values that do not parse fall back to their default. Broker settings are
/// read separately by [`broker::BrokerConfig::from_env`].
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub roles: BTreeSet<ServiceRole>,
    pub existence: ExistenceMode,
    pub existence_timeout: Duration,
    pub probe: RetryPolicy,
    pub retry_delay: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let millis = |key: &str, default: Duration| {
            get(key)
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(default)
        };

        Self {
            host: get("HOST").unwrap_or(defaults.host),
            port: get("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: get("RUST_LOG").unwrap_or(defaults.log_level),
            roles: get("SERVICE_ROLES")
                .and_then(|r| ServiceRole::parse_list(&r).ok())
                .filter(|roles| !roles.is_empty())
                .unwrap_or(defaults.roles),
            existence: get("EXISTENCE_CHECK")
                .and_then(|e| e.parse().ok())
                .unwrap_or(defaults.existence),
            existence_timeout: millis("EXISTENCE_TIMEOUT_MS", defaults.existence_timeout),
            probe: RetryPolicy {
                max_attempts: get("PROBE_MAX_ATTEMPTS")
                    .and_then(|a| a.parse().ok())
                    .filter(|&a| a > 0)
                    .unwrap_or(defaults.probe.max_attempts),
                backoff: millis("PROBE_BACKOFF_MS", defaults.probe.backoff),
            },
            retry_delay: millis("CONSUMER_RETRY_DELAY_MS", defaults.retry_delay),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The messaging wiring for this node.
    pub fn node_config(&self) -> NodeConfig {
        NodeConfig {
            roles: self.roles.clone(),
            existence: self.existence,
            existence_timeout: self.existence_timeout,
            probe: self.probe,
            retry_delay: self.retry_delay,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let node = NodeConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            roles: node.roles,
            existence: node.existence,
            existence_timeout: node.existence_timeout,
            probe: node.probe,
            retry_delay: node.retry_delay,
        }
    }
}
