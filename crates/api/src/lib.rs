//! HTTP host for a shop service node.
//!
//! Runs the consumers for the roles this process hosts and exposes the
//! request-side operations (login, cart, checkout, invoices) over REST,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use common::UserId;
use domain::{
    InMemoryCartRepository, InMemoryCatalog, InMemoryInvoiceRepository, InMemoryUserDirectory,
    Product, User,
};
use messaging::Collaborators;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/login", post(routes::login::login))
        .route("/carts/{user_id}", get(routes::carts::get))
        .route("/carts/{user_id}/items", post(routes::carts::add_item))
        .route("/carts/{user_id}/checkout", post(routes::carts::checkout))
        .route("/invoices/{user_id}", get(routes::invoices::list))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// In-memory collaborators seeded with a small catalog and one demo user
/// (`demo` / `demo`, id 1).
pub async fn create_default_collaborators() -> Collaborators {
    let catalog = InMemoryCatalog::with_products([
        Product::new(1, "The Rust Programming Language"),
        Product::new(2, "Programming Rust"),
        Product::new(3, "Rust for Rustaceans"),
        Product::new(42, "Zero To Production"),
    ]);

    let users = InMemoryUserDirectory::new();
    users
        .register(
            User {
                id: UserId::new(1),
                username: "demo".to_string(),
                email: "demo@example.com".to_string(),
            },
            "demo",
        )
        .await;

    Collaborators {
        catalog: Arc::new(catalog),
        carts: Arc::new(InMemoryCartRepository::new()),
        invoices: Arc::new(InMemoryInvoiceRepository::new()),
        users: Arc::new(users),
    }
}
