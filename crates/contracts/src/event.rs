//! Compile-time association between an event type and its topic.

use serde::{Serialize, de::DeserializeOwned};

/// A record that can be published to and consumed from a broker topic.
///
/// ```rust
/// use contracts::{Event, UserLoggedIn, topics};
///
/// assert_eq!(UserLoggedIn::TOPIC, topics::USER_EVENTS);
/// ```
pub trait Event: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The topic events of this type are published to and consumed from.
    const TOPIC: &'static str;

    /// Short type name used in logs and metrics labels.
    const EVENT_TYPE: &'static str;
}
