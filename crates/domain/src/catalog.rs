//! Product catalog lookup and its in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::ProductId;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{DomainError, Result};

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
}

impl Product {
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Looks products up by id.
///
/// `Ok(None)` means the catalog answered and the product does not exist;
/// `Err` means the catalog could not answer.
#[async_trait]
pub trait ProductLookup: Send + Sync {
    async fn lookup_product(&self, id: ProductId) -> Result<Option<Product>>;
}

#[derive(Debug, Default)]
struct CatalogState {
    products: HashMap<ProductId, Product>,
    fail_on_lookup: bool,
    lookups: u64,
}

/// In-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    state: Arc<RwLock<CatalogState>>,
}

impl InMemoryCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog holding `products`.
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let products = products.into_iter().map(|p| (p.id, p)).collect();
        Self {
            state: Arc::new(RwLock::new(CatalogState {
                products,
                ..CatalogState::default()
            })),
        }
    }

    /// Adds or replaces a product.
    pub async fn insert(&self, product: Product) {
        self.state.write().await.products.insert(product.id, product);
    }

    /// Configures every following lookup to fail.
    pub async fn set_fail_on_lookup(&self, fail: bool) {
        self.state.write().await.fail_on_lookup = fail;
    }

    /// Returns how many lookups were made, failed ones included.
    pub async fn lookup_count(&self) -> u64 {
        self.state.read().await.lookups
    }
}

#[async_trait]
impl ProductLookup for InMemoryCatalog {
    async fn lookup_product(&self, id: ProductId) -> Result<Option<Product>> {
        let mut state = self.state.write().await;
        state.lookups += 1;

        if state.fail_on_lookup {
            return Err(DomainError::Dependency(
                "catalog lookup unavailable".to_string(),
            ));
        }

        Ok(state.products.get(&id).cloned())
    }
}
