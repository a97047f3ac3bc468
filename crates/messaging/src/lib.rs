//! Asynchronous coordination between the shop services.
//!
//! This crate provides the pieces that let services cooperate over a
//! pub/sub broker without calling each other:
//! - `EventProducer` publishes typed events to their topics
//! - `TopicConsumer` runs a cancellation-aware poll loop per consumer group
//! - `ReadinessProbe` gates consumers on broker availability at startup
//! - `Correlator` matches asynchronous answers back to waiting callers
//! - `Node` wires services, handlers and consumers for the roles a process hosts
//!
//! The choreography it implements:
//! 1. Login publishes `UserLoggedIn`; the cart side provisions a cart
//! 2. Adding an item checks that the product exists, then requests its details
//! 3. Checkout publishes `CartCheckedOut`; the invoice side issues an invoice

pub mod consumer;
pub mod correlator;
pub mod error;
pub mod existence;
pub mod handlers;
pub mod node;
pub mod producer;
pub mod readiness;
pub mod runtime;
pub mod services;
pub mod state;

pub use consumer::{EventHandler, TopicConsumer};
pub use correlator::{Correlator, PendingResponse};
pub use error::{MessagingError, Result};
pub use existence::{
    CorrelatedExistence, DirectLookupExistence, ExistenceMode, ProductExistence,
};
pub use node::{Collaborators, Node, NodeConfig, ServiceRole};
pub use producer::EventProducer;
pub use readiness::{ReadinessProbe, RetryPolicy};
pub use runtime::{ConsumerRuntime, ConsumerStatus, ConsumerStatuses};
pub use services::{CartService, InvoiceService, LoginService};
pub use state::ConsumerState;
