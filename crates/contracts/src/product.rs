//! Product existence and product detail events.

use common::{ProductId, RequestId};
use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::topics;

/// Asks the catalog whether a product exists.
///
/// The product id is the only correlation anchor: the answer is matched back
/// to the waiting caller by `product_id` alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductExistenceQuery {
    pub product_id: ProductId,
}

impl Event for ProductExistenceQuery {
    const TOPIC: &'static str = topics::CHECK_PRODUCT_EXISTS;
    const EVENT_TYPE: &'static str = "ProductExistenceQuery";
}

/// The catalog's answer to a [`ProductExistenceQuery`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductExistenceResult {
    pub product_id: ProductId,
    pub exists: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ProductExistenceResult {
    /// Result for a product the catalog knows about.
    pub fn found(product_id: ProductId, name: impl Into<String>) -> Self {
        Self {
            product_id,
            exists: true,
            name: Some(name.into()),
        }
    }

    /// Result for an unknown product.
    pub fn missing(product_id: ProductId) -> Self {
        Self {
            product_id,
            exists: false,
            name: None,
        }
    }
}

impl Event for ProductExistenceResult {
    const TOPIC: &'static str = topics::PRODUCT_EXISTS_RESPONSE;
    const EVENT_TYPE: &'static str = "ProductExistenceResult";
}

/// Requests product details for a cart item awaiting its name.
///
/// Shares the `cart-events` topic with checkouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequested {
    pub requested_id: RequestId,
    pub product_id: ProductId,
}

impl Event for ProductRequested {
    const TOPIC: &'static str = topics::CART_EVENTS;
    const EVENT_TYPE: &'static str = "ProductRequested";
}

/// Product details answering a [`ProductRequested`], echoing its request id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub requested_id: RequestId,
    pub product_id: ProductId,
    pub exists: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Event for ProductResponse {
    const TOPIC: &'static str = topics::PRODUCT_RESPONSE;
    const EVENT_TYPE: &'static str = "ProductResponse";
}
