//! HTTP route handlers.

pub mod carts;
pub mod health;
pub mod invoices;
pub mod login;
pub mod metrics;
