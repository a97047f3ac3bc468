//! Catalog-side handlers: answer product queries.

use std::sync::Arc;

use async_trait::async_trait;
use contracts::{ProductExistenceQuery, ProductExistenceResult, ProductRequested, ProductResponse};
use domain::ProductLookup;

use crate::consumer::EventHandler;
use crate::error::Result;
use crate::producer::EventProducer;

/// Answers [`ProductExistenceQuery`] with a [`ProductExistenceResult`].
pub struct CheckProductExistsHandler {
    catalog: Arc<dyn ProductLookup>,
    producer: EventProducer,
}

impl CheckProductExistsHandler {
    pub fn new(catalog: Arc<dyn ProductLookup>, producer: EventProducer) -> Self {
        Self { catalog, producer }
    }
}

#[async_trait]
impl EventHandler<ProductExistenceQuery> for CheckProductExistsHandler {
    #[tracing::instrument(skip(self), fields(product_id = %query.product_id))]
    async fn handle(&self, query: ProductExistenceQuery) -> Result<()> {
        let result = match self.catalog.lookup_product(query.product_id).await? {
            Some(product) => ProductExistenceResult::found(query.product_id, product.name),
            None => ProductExistenceResult::missing(query.product_id),
        };

        tracing::debug!(exists = result.exists, "answering existence query");
        self.producer.publish(&result).await?;
        Ok(())
    }
}

/// Answers [`ProductRequested`] with a [`ProductResponse`] carrying the same
/// request id.
pub struct ProductRequestedHandler {
    catalog: Arc<dyn ProductLookup>,
    producer: EventProducer,
}

impl ProductRequestedHandler {
    pub fn new(catalog: Arc<dyn ProductLookup>, producer: EventProducer) -> Self {
        Self { catalog, producer }
    }
}

#[async_trait]
impl EventHandler<ProductRequested> for ProductRequestedHandler {
    #[tracing::instrument(skip(self), fields(requested_id = %request.requested_id, product_id = %request.product_id))]
    async fn handle(&self, request: ProductRequested) -> Result<()> {
        let product = self.catalog.lookup_product(request.product_id).await?;

        let response = ProductResponse {
            requested_id: request.requested_id,
            product_id: request.product_id,
            exists: product.is_some(),
            name: product.map(|p| p.name),
        };

        self.producer.publish(&response).await?;
        Ok(())
    }
}
