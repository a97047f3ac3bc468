//! Shared state handed to every route.

use messaging::{CartService, ConsumerStatuses, InvoiceService, LoginService, Node};

use crate::error::ApiError;

/// Services of the roles this node hosts plus the consumers' health.
#[derive(Clone)]
pub struct AppState {
    pub cart: Option<CartService>,
    pub login: Option<LoginService>,
    pub invoices: Option<InvoiceService>,
    pub statuses: ConsumerStatuses,
}

impl AppState {
    pub fn from_node(node: &Node) -> Self {
        Self {
            cart: node.cart().cloned(),
            login: node.login().cloned(),
            invoices: node.invoices().cloned(),
            statuses: node.statuses(),
        }
    }

    pub fn cart(&self) -> Result<&CartService, ApiError> {
        self.cart.as_ref().ok_or(ApiError::NotHosted("cart"))
    }

    pub fn login(&self) -> Result<&LoginService, ApiError> {
        self.login.as_ref().ok_or(ApiError::NotHosted("user"))
    }

    pub fn invoices(&self) -> Result<&InvoiceService, ApiError> {
        self.invoices.as_ref().ok_or(ApiError::NotHosted("invoice"))
    }
}
