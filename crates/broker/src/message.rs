use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message read from a topic.
///
/// The payload is kept as raw bytes: decoding is the consumer's job, so a
/// malformed payload only ever affects the message that carries it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// The topic the message was read from.
    pub topic: String,

    /// Partition within the topic.
    pub partition: i32,

    /// Offset within the partition.
    pub offset: i64,

    /// When the broker accepted the message.
    pub timestamp: DateTime<Utc>,

    /// The raw payload.
    pub payload: Vec<u8>,
}

impl Message {
    /// Returns the payload as text, replacing invalid UTF-8 sequences.
    ///
    /// Meant for log lines, not for decoding.
    pub fn payload_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Where a published message landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

impl std::fmt::Display for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]@{}", self.topic, self.partition, self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_lossy_replaces_invalid_utf8() {
        let message = Message {
            topic: "user-events".to_string(),
            partition: 0,
            offset: 3,
            timestamp: Utc::now(),
            payload: vec![b'{', 0xff, b'}'],
        };

        assert_eq!(message.payload_lossy(), "{\u{fffd}}");
    }

    #[test]
    fn test_delivery_display() {
        let delivery = Delivery {
            topic: "cart-events".to_string(),
            partition: 0,
            offset: 12,
        };
        assert_eq!(delivery.to_string(), "cart-events[0]@12");
    }
}
