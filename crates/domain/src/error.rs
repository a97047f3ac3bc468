//! Domain error types.

use common::{ProductId, UserId};
use thiserror::Error;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The user has no cart.
    #[error("Cart not found for user {user_id}")]
    CartNotFound { user_id: UserId },

    /// Checkout was attempted on a cart without items.
    #[error("Cart for user {user_id} is empty")]
    EmptyCart { user_id: UserId },

    /// The product does not exist, or its existence could not be confirmed
    /// in time.
    #[error("Product not found: {product_id}")]
    ProductNotFound { product_id: ProductId },

    /// A cart item quantity must be at least one.
    #[error("Invalid quantity: {quantity}")]
    InvalidQuantity { quantity: i32 },

    /// Unknown user or wrong password.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// A collaborating service could not answer.
    #[error("Dependency failure: {0}")]
    Dependency(String),

    /// A storage operation failed.
    #[error("Repository error: {0}")]
    Repository(String),
}

impl DomainError {
    /// Returns true if the error names something that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DomainError::CartNotFound { .. } | DomainError::ProductNotFound { .. }
        )
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
