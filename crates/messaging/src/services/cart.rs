//! Cart operations that publish events.

use std::sync::Arc;

use common::{ProductId, RequestId, UserId};
use contracts::{CartCheckedOut, CheckedOutItem, ProductRequested};
use domain::{Cart, CartItem, CartRepository, DomainError, LineId};

use crate::error::Result;
use crate::existence::ProductExistence;
use crate::producer::EventProducer;

/// Cart-side entry points of the choreography.
#[derive(Clone)]
pub struct CartService {
    carts: Arc<dyn CartRepository>,
    existence: Arc<dyn ProductExistence>,
    producer: EventProducer,
}

impl CartService {
    pub fn new(
        carts: Arc<dyn CartRepository>,
        existence: Arc<dyn ProductExistence>,
        producer: EventProducer,
    ) -> Self {
        Self {
            carts,
            existence,
            producer,
        }
    }

    /// Creates a cart for a user who just logged in. Never deduplicates.
    #[tracing::instrument(skip(self))]
    pub async fn provision_cart(&self, user_id: UserId) -> Result<Cart> {
        let cart = self.carts.create_cart(user_id).await?;
        tracing::info!("cart provisioned");
        Ok(cart)
    }

    pub async fn get_cart(&self, user_id: UserId) -> Result<Cart> {
        Ok(self
            .carts
            .get_cart(user_id)
            .await?
            .ok_or(DomainError::CartNotFound { user_id })?)
    }

    /// Adds a product after confirming it exists, then requests its details.
    ///
    /// The new line waits on a fresh request id until the catalog's
    /// [`ProductResponse`](contracts::ProductResponse) names it. If the
    /// request cannot be published the line waiting on that id is removed
    /// again and the add fails.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<Cart> {
        if quantity < 1 {
            return Err(DomainError::InvalidQuantity { quantity }.into());
        }

        if self.carts.get_cart(user_id).await?.is_none() {
            return Err(DomainError::CartNotFound { user_id }.into());
        }

        if !self.existence.exists(product_id).await? {
            tracing::info!("product does not exist, item rejected");
            return Err(DomainError::ProductNotFound { product_id }.into());
        }

        let requested_id = RequestId::new();
        let cart = self
            .carts
            .add_item(
                user_id,
                CartItem::new(product_id, quantity).with_pending_request(requested_id),
            )
            .await?;

        if let Err(e) = self
            .producer
            .publish(&ProductRequested {
                requested_id,
                product_id,
            })
            .await
        {
            self.carts.remove_pending(requested_id).await?;
            return Err(e);
        }

        tracing::info!(%requested_id, "item added");
        Ok(cart)
    }

    /// Publishes [`CartCheckedOut`] and then removes the checked-out lines.
    ///
    /// Lines are only removed once the event is out, so a failed publish
    /// leaves the cart as it was. Lines added while the event is in flight
    /// stay in the cart.
    #[tracing::instrument(skip(self))]
    pub async fn checkout(&self, user_id: UserId) -> Result<CartCheckedOut> {
        let cart = self.get_cart(user_id).await?;
        if cart.is_empty() {
            return Err(DomainError::EmptyCart { user_id }.into());
        }

        let event = CartCheckedOut {
            user_id,
            items: cart
                .items
                .iter()
                .map(|item| CheckedOutItem {
                    product_id: item.product_id,
                    quantity: item.quantity,
                })
                .collect(),
        };

        self.producer.publish(&event).await?;

        let checked_out: Vec<LineId> = cart.items.iter().map(|item| item.line_id).collect();
        self.carts.remove_lines(user_id, &checked_out).await?;

        tracing::info!(items = event.items.len(), "cart checked out");
        Ok(event)
    }
}
