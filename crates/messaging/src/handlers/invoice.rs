//! Invoice-side handler.

use async_trait::async_trait;
use contracts::CartCheckedOut;

use crate::consumer::EventHandler;
use crate::error::Result;
use crate::services::InvoiceService;

/// Issues an invoice for every checkout.
pub struct CartCheckedOutHandler {
    invoices: InvoiceService,
}

impl CartCheckedOutHandler {
    pub fn new(invoices: InvoiceService) -> Self {
        Self { invoices }
    }
}

#[async_trait]
impl EventHandler<CartCheckedOut> for CartCheckedOutHandler {
    async fn handle(&self, event: CartCheckedOut) -> Result<()> {
        self.invoices.create_from_checkout(event).await?;
        Ok(())
    }
}
