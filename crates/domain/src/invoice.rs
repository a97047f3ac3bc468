//! Invoices issued on checkout.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ProductId, UserId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{DomainError, Result};

/// One invoiced product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub product_id: ProductId,
    pub quantity: i32,
    /// `None` when the catalog does not know the product.
    pub product_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: u64,
    pub user_id: UserId,
    pub issued_at: DateTime<Utc>,
    pub lines: Vec<InvoiceLine>,
}

/// Invoice storage.
#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// Stores a new invoice and returns it with its assigned id.
    async fn create_invoice(&self, user_id: UserId, lines: Vec<InvoiceLine>) -> Result<Invoice>;

    /// All invoices of a user, oldest first.
    async fn invoices_for_user(&self, user_id: UserId) -> Result<Vec<Invoice>>;
}

#[derive(Debug, Default)]
struct InvoiceState {
    invoices: HashMap<UserId, Vec<Invoice>>,
    next_id: u64,
    fail_on_create: bool,
}

/// In-memory invoice repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInvoiceRepository {
    state: Arc<RwLock<InvoiceState>>,
}

impl InMemoryInvoiceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures invoice creation to fail.
    pub async fn set_fail_on_create(&self, fail: bool) {
        self.state.write().await.fail_on_create = fail;
    }

    /// Total number of invoices across all users.
    pub async fn invoice_count(&self) -> usize {
        self.state.read().await.invoices.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl InvoiceRepository for InMemoryInvoiceRepository {
    async fn create_invoice(&self, user_id: UserId, lines: Vec<InvoiceLine>) -> Result<Invoice> {
        let mut state = self.state.write().await;

        if state.fail_on_create {
            return Err(DomainError::Repository(
                "invoice storage unavailable".to_string(),
            ));
        }

        state.next_id += 1;
        let invoice = Invoice {
            id: state.next_id,
            user_id,
            issued_at: Utc::now(),
            lines,
        };
        state
            .invoices
            .entry(user_id)
            .or_default()
            .push(invoice.clone());

        Ok(invoice)
    }

    async fn invoices_for_user(&self, user_id: UserId) -> Result<Vec<Invoice>> {
        Ok(self
            .state
            .read()
            .await
            .invoices
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product_id: i32, quantity: i32) -> InvoiceLine {
        InvoiceLine {
            product_id: ProductId::new(product_id),
            quantity,
            product_name: None,
        }
    }

    #[tokio::test]
    async fn test_sequential_invoice_ids() {
        let repo = InMemoryInvoiceRepository::new();

        let first = repo
            .create_invoice(UserId::new(1), vec![line(1, 2)])
            .await
            .unwrap();
        let second = repo
            .create_invoice(UserId::new(2), vec![line(3, 1)])
            .await
            .unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(repo.invoice_count().await, 2);
    }

    #[tokio::test]
    async fn test_invoices_for_user() {
        let repo = InMemoryInvoiceRepository::new();
        repo.create_invoice(UserId::new(5), vec![line(1, 2)])
            .await
            .unwrap();

        let invoices = repo.invoices_for_user(UserId::new(5)).await.unwrap();
        assert_eq!(invoices.len(), 1);
        assert_eq!(invoices[0].lines, vec![line(1, 2)]);

        assert!(
            repo.invoices_for_user(UserId::new(6))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_fail_on_create() {
        let repo = InMemoryInvoiceRepository::new();
        repo.set_fail_on_create(true).await;

        let result = repo.create_invoice(UserId::new(5), vec![]).await;
        assert!(matches!(result, Err(DomainError::Repository(_))));
        assert_eq!(repo.invoice_count().await, 0);
    }
}
