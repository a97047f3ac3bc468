//! Event schemas exchanged over the broker.
//!
//! Every record here is a plain, versionless JSON document with camelCase
//! field names. Each type knows the topic it travels on through the
//! [`Event`] trait, so producers and consumers cannot disagree about where a
//! payload lives.

pub mod cart;
pub mod event;
pub mod groups;
pub mod product;
pub mod topics;
pub mod user;

pub use cart::{CartCheckedOut, CheckedOutItem};
pub use event::Event;
pub use product::{ProductExistenceQuery, ProductExistenceResult, ProductRequested, ProductResponse};
pub use user::UserLoggedIn;
