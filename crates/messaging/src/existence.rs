//! Strategies for asking whether a product exists.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::ProductId;
use contracts::ProductExistenceQuery;
use domain::{DomainError, ProductLookup};

use crate::correlator::Correlator;
use crate::error::Result;
use crate::producer::EventProducer;

/// Default wait for a correlated existence answer.
pub const DEFAULT_EXISTENCE_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait ProductExistence: Send + Sync {
    async fn exists(&self, product_id: ProductId) -> Result<bool>;
}

/// Which [`ProductExistence`] strategy a node uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExistenceMode {
    /// Ask the catalog directly.
    #[default]
    Direct,
    /// Publish a query and wait for the answer on the response topic.
    Correlated,
}

impl FromStr for ExistenceMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" => Ok(Self::Direct),
            "correlated" => Ok(Self::Correlated),
            other => Err(format!("unknown existence check: {other}")),
        }
    }
}

/// Asks the catalog synchronously. A catalog that cannot answer is a
/// dependency failure, not a missing product.
pub struct DirectLookupExistence {
    catalog: Arc<dyn ProductLookup>,
}

impl DirectLookupExistence {
    pub fn new(catalog: Arc<dyn ProductLookup>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl ProductExistence for DirectLookupExistence {
    async fn exists(&self, product_id: ProductId) -> Result<bool> {
        match self.catalog.lookup_product(product_id).await {
            Ok(product) => Ok(product.is_some()),
            Err(e @ DomainError::Dependency(_)) => Err(e.into()),
            Err(e) => Err(DomainError::Dependency(e.to_string()).into()),
        }
    }
}

/// Publishes a [`ProductExistenceQuery`] and waits for the catalog's answer.
///
/// The registration is made before the query goes out. No answer within the
/// timeout means the product does not exist.
pub struct CorrelatedExistence {
    correlator: Correlator<ProductId>,
    producer: EventProducer,
    timeout: Duration,
}

impl CorrelatedExistence {
    pub fn new(correlator: Correlator<ProductId>, producer: EventProducer, timeout: Duration) -> Self {
        Self {
            correlator,
            producer,
            timeout,
        }
    }
}

#[async_trait]
impl ProductExistence for CorrelatedExistence {
    #[tracing::instrument(skip(self), fields(timeout = ?self.timeout))]
    async fn exists(&self, product_id: ProductId) -> Result<bool> {
        let pending = self.correlator.register(product_id, self.timeout);
        self.producer
            .publish(&ProductExistenceQuery { product_id })
            .await?;

        let exists = pending.wait().await;
        tracing::debug!(exists, "existence answer");
        Ok(exists)
    }
}
