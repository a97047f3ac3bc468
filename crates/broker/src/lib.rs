pub mod config;
pub mod error;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory;
pub mod message;
pub mod transport;

pub use config::BrokerConfig;
pub use error::{BrokerError, Result};
#[cfg(feature = "kafka")]
pub use kafka::KafkaBroker;
pub use memory::{InMemoryBroker, PollFault};
pub use message::{Delivery, Message};
pub use transport::{Broker, Publisher, Subscription};
