//! Message handlers, one per consumed topic concern.

pub mod cart;
pub mod catalog;
pub mod invoice;

pub use cart::{ProductExistsResponseHandler, ProductResponseHandler, UserLoggedHandler};
pub use catalog::{CheckProductExistsHandler, ProductRequestedHandler};
pub use invoice::CartCheckedOutHandler;
