//! Services that drive the choreography from the request side.

pub mod cart;
pub mod invoice;
pub mod login;

pub use cart::CartService;
pub use invoice::InvoiceService;
pub use login::LoginService;
