//! Cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{ProductId, UserId};
use domain::Cart;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub product_id: i32,
    pub quantity: i32,
}

// -- Response types --

#[derive(Serialize)]
pub struct CartResponse {
    pub user_id: i32,
    pub created_at: DateTime<Utc>,
    pub items: Vec<CartItemResponse>,
}

#[derive(Serialize)]
pub struct CartItemResponse {
    pub product_id: i32,
    pub quantity: i32,
    pub product_name: Option<String>,
    /// True until the catalog has answered the product request.
    pub pending: bool,
}

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub user_id: i32,
    pub items: Vec<CheckedOutItemResponse>,
}

#[derive(Serialize)]
pub struct CheckedOutItemResponse {
    pub product_id: i32,
    pub quantity: i32,
}

impl From<Cart> for CartResponse {
    fn from(cart: Cart) -> Self {
        Self {
            user_id: cart.user_id.as_i32(),
            created_at: cart.created_at,
            items: cart
                .items
                .into_iter()
                .map(|item| CartItemResponse {
                    product_id: item.product_id.as_i32(),
                    quantity: item.quantity,
                    pending: item.pending_request.is_some(),
                    product_name: item.product_name,
                })
                .collect(),
        }
    }
}

// -- Handlers --

/// GET /carts/:user_id: the user's latest cart.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state.cart()?.get_cart(UserId::new(user_id)).await?;
    Ok(Json(cart.into()))
}

/// POST /carts/:user_id/items: add a product once it is known to exist.
#[tracing::instrument(skip(state, req), fields(product_id = req.product_id, quantity = req.quantity))]
pub async fn add_item(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
    Json(req): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<CartResponse>), ApiError> {
    let cart = state
        .cart()?
        .add_item(
            UserId::new(user_id),
            ProductId::new(req.product_id),
            req.quantity,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(cart.into())))
}

/// POST /carts/:user_id/checkout: publish the checkout and empty the cart.
#[tracing::instrument(skip(state))]
pub async fn checkout(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let event = state.cart()?.checkout(UserId::new(user_id)).await?;

    Ok(Json(CheckoutResponse {
        user_id: event.user_id.as_i32(),
        items: event
            .items
            .into_iter()
            .map(|item| CheckedOutItemResponse {
                product_id: item.product_id.as_i32(),
                quantity: item.quantity,
            })
            .collect(),
    }))
}
