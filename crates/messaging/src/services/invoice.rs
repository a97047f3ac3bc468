//! Invoicing of checked-out carts.

use std::sync::Arc;

use common::UserId;
use contracts::CartCheckedOut;
use domain::{Invoice, InvoiceLine, InvoiceRepository, ProductLookup};

use crate::error::Result;

/// Turns checkouts into invoices, naming each line from the catalog.
#[derive(Clone)]
pub struct InvoiceService {
    invoices: Arc<dyn InvoiceRepository>,
    catalog: Arc<dyn ProductLookup>,
}

impl InvoiceService {
    pub fn new(invoices: Arc<dyn InvoiceRepository>, catalog: Arc<dyn ProductLookup>) -> Self {
        Self { invoices, catalog }
    }

    /// Creates one invoice with a line per checked-out item.
    ///
    /// Products are looked up one at a time. An unknown product still gets
    /// its line, without a name; a catalog that cannot answer fails the
    /// whole invoice.
    #[tracing::instrument(skip(self, event), fields(user_id = %event.user_id, items = event.items.len()))]
    pub async fn create_from_checkout(&self, event: CartCheckedOut) -> Result<Invoice> {
        let mut lines = Vec::with_capacity(event.items.len());

        for item in event.items {
            let product = self.catalog.lookup_product(item.product_id).await?;
            if product.is_none() {
                tracing::warn!(product_id = %item.product_id, "product does not exist");
            }

            lines.push(InvoiceLine {
                product_id: item.product_id,
                quantity: item.quantity,
                product_name: product.map(|p| p.name),
            });
        }

        let invoice = self.invoices.create_invoice(event.user_id, lines).await?;
        tracing::info!(invoice_id = invoice.id, "invoice created");
        Ok(invoice)
    }

    pub async fn invoices_for_user(&self, user_id: UserId) -> Result<Vec<Invoice>> {
        Ok(self.invoices.invoices_for_user(user_id).await?)
    }
}
