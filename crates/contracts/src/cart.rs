//! Cart service events.

use common::{ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::topics;

/// One line of a checked-out cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckedOutItem {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// Published when a cart is finalized. The invoice service builds an invoice
/// from it; nothing acknowledges it back to the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartCheckedOut {
    pub user_id: UserId,
    pub items: Vec<CheckedOutItem>,
}

impl Event for CartCheckedOut {
    const TOPIC: &'static str = topics::CART_EVENTS;
    const EVENT_TYPE: &'static str = "CartCheckedOut";
}
