//! Collaborators behind the cross-service choreography.
//!
//! This crate provides the services the message handlers talk to:
//! - `ProductLookup` for the product catalog
//! - `CartRepository` for shopping carts
//! - `InvoiceRepository` for invoices issued on checkout
//! - `UserDirectory` for credential checks
//!
//! Each comes with an in-memory implementation.

pub mod cart;
pub mod catalog;
pub mod error;
pub mod invoice;
pub mod user;

pub use cart::{Cart, CartItem, CartRepository, InMemoryCartRepository, LineId};
pub use catalog::{InMemoryCatalog, Product, ProductLookup};
pub use common::{ProductId, RequestId, UserId};
pub use error::{DomainError, Result};
pub use invoice::{InMemoryInvoiceRepository, Invoice, InvoiceLine, InvoiceRepository};
pub use user::{InMemoryUserDirectory, User, UserDirectory};
