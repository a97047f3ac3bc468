//! Invoice endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use common::UserId;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct InvoiceResponse {
    pub id: u64,
    pub user_id: i32,
    pub issued_at: DateTime<Utc>,
    pub lines: Vec<InvoiceLineResponse>,
}

#[derive(Serialize)]
pub struct InvoiceLineResponse {
    pub product_id: i32,
    pub quantity: i32,
    pub product_name: Option<String>,
}

/// GET /invoices/:user_id: every invoice issued to the user, oldest first.
#[tracing::instrument(skip(state))]
pub async fn list(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
) -> Result<Json<Vec<InvoiceResponse>>, ApiError> {
    let invoices = state
        .invoices()?
        .invoices_for_user(UserId::new(user_id))
        .await?;

    Ok(Json(
        invoices
            .into_iter()
            .map(|invoice| InvoiceResponse {
                id: invoice.id,
                user_id: invoice.user_id.as_i32(),
                issued_at: invoice.issued_at,
                lines: invoice
                    .lines
                    .into_iter()
                    .map(|line| InvoiceLineResponse {
                        product_id: line.product_id.as_i32(),
                        quantity: line.quantity,
                        product_name: line.product_name,
                    })
                    .collect(),
            })
            .collect(),
    ))
}
