//! Cart-side handlers.

use std::sync::Arc;

use async_trait::async_trait;
use common::ProductId;
use contracts::{ProductExistenceResult, ProductResponse, UserLoggedIn};
use domain::CartRepository;

use crate::consumer::EventHandler;
use crate::correlator::Correlator;
use crate::error::Result;
use crate::services::CartService;

/// Resolves pending existence checks from the catalog's answers.
pub struct ProductExistsResponseHandler {
    correlator: Correlator<ProductId>,
}

impl ProductExistsResponseHandler {
    pub fn new(correlator: Correlator<ProductId>) -> Self {
        Self { correlator }
    }
}

#[async_trait]
impl EventHandler<ProductExistenceResult> for ProductExistsResponseHandler {
    async fn handle(&self, result: ProductExistenceResult) -> Result<()> {
        let resolved = self.correlator.resolve(&result.product_id, result.exists);
        tracing::debug!(
            product_id = %result.product_id,
            exists = result.exists,
            resolved,
            "existence answer received"
        );
        Ok(())
    }
}

/// Provisions a cart for every login.
pub struct UserLoggedHandler {
    carts: CartService,
}

impl UserLoggedHandler {
    pub fn new(carts: CartService) -> Self {
        Self { carts }
    }
}

#[async_trait]
impl EventHandler<UserLoggedIn> for UserLoggedHandler {
    async fn handle(&self, event: UserLoggedIn) -> Result<()> {
        self.carts.provision_cart(event.user_id).await?;
        Ok(())
    }
}

/// Names cart items once the catalog answers their product request.
pub struct ProductResponseHandler {
    carts: Arc<dyn CartRepository>,
}

impl ProductResponseHandler {
    pub fn new(carts: Arc<dyn CartRepository>) -> Self {
        Self { carts }
    }
}

#[async_trait]
impl EventHandler<ProductResponse> for ProductResponseHandler {
    #[tracing::instrument(skip(self), fields(requested_id = %response.requested_id))]
    async fn handle(&self, response: ProductResponse) -> Result<()> {
        let name = match (response.exists, response.name) {
            (true, Some(name)) => name,
            _ => {
                tracing::warn!(product_id = %response.product_id, "requested product does not exist");
                return Ok(());
            }
        };

        if !self
            .carts
            .attach_product_name(response.requested_id, name)
            .await?
        {
            tracing::debug!("no cart item waits on this request");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::existence::DirectLookupExistence;
    use crate::producer::EventProducer;
    use broker::InMemoryBroker;
    use common::{RequestId, UserId};
    use domain::{CartItem, InMemoryCartRepository, InMemoryCatalog};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_existence_answer_resolves_pending_check() {
        let correlator = Correlator::new();
        let handler = ProductExistsResponseHandler::new(correlator.clone());
        let pending = correlator.register(ProductId::new(42), Duration::from_secs(5));

        handler
            .handle(ProductExistenceResult::found(ProductId::new(42), "Dune"))
            .await
            .unwrap();

        assert!(pending.wait().await);
    }

    #[tokio::test]
    async fn test_late_existence_answer_is_ignored() {
        let handler = ProductExistsResponseHandler::new(Correlator::new());

        let result = handler
            .handle(ProductExistenceResult::missing(ProductId::new(42)))
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_login_provisions_cart_each_time() {
        let carts = InMemoryCartRepository::new();
        let service = CartService::new(
            Arc::new(carts.clone()),
            Arc::new(DirectLookupExistence::new(Arc::new(InMemoryCatalog::new()))),
            EventProducer::new(Arc::new(InMemoryBroker::new())),
        );
        let handler = UserLoggedHandler::new(service);
        let event = UserLoggedIn {
            user_id: UserId::new(99),
            email: "alice@example.com".to_string(),
        };

        handler.handle(event.clone()).await.unwrap();
        handler.handle(event).await.unwrap();

        assert_eq!(carts.cart_count(UserId::new(99)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_product_response_names_pending_item() {
        let carts = InMemoryCartRepository::new();
        let requested_id = RequestId::new();
        carts.create_cart(UserId::new(5)).await.unwrap();
        carts
            .add_item(
                UserId::new(5),
                CartItem::new(ProductId::new(1), 1).with_pending_request(requested_id),
            )
            .await
            .unwrap();
        let handler = ProductResponseHandler::new(Arc::new(carts.clone()));

        handler
            .handle(ProductResponse {
                requested_id,
                product_id: ProductId::new(1),
                exists: true,
                name: Some("Dune".to_string()),
            })
            .await
            .unwrap();

        let cart = carts.get_cart(UserId::new(5)).await.unwrap().unwrap();
        assert_eq!(cart.items[0].product_name.as_deref(), Some("Dune"));
        assert!(cart.items[0].pending_request.is_none());
    }

    #[tokio::test]
    async fn test_missing_product_response_leaves_item_pending() {
        let carts = InMemoryCartRepository::new();
        let requested_id = RequestId::new();
        carts.create_cart(UserId::new(5)).await.unwrap();
        carts
            .add_item(
                UserId::new(5),
                CartItem::new(ProductId::new(1), 1).with_pending_request(requested_id),
            )
            .await
            .unwrap();
        let handler = ProductResponseHandler::new(Arc::new(carts.clone()));

        handler
            .handle(ProductResponse {
                requested_id,
                product_id: ProductId::new(1),
                exists: false,
                name: None,
            })
            .await
            .unwrap();

        let cart = carts.get_cart(UserId::new(5)).await.unwrap().unwrap();
        assert!(cart.items[0].product_name.is_none());
        assert_eq!(cart.items[0].pending_request, Some(requested_id));
    }
}
