//! Shopping carts.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ProductId, RequestId, UserId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{DomainError, Result};

/// Identity of a cart line, fixed when the line is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(Uuid);

impl LineId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LineId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A line in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub line_id: LineId,
    pub product_id: ProductId,
    pub quantity: i32,
    /// Filled in once the catalog answers the product request.
    pub product_name: Option<String>,
    /// The outstanding product request for this line, if any.
    pub pending_request: Option<RequestId>,
}

impl CartItem {
    pub fn new(product_id: ProductId, quantity: i32) -> Self {
        Self {
            line_id: LineId::new(),
            product_id,
            quantity,
            product_name: None,
            pending_request: None,
        }
    }

    pub fn with_pending_request(mut self, request_id: RequestId) -> Self {
        self.pending_request = Some(request_id);
        self
    }
}

/// A user's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub user_id: UserId,
    pub items: Vec<CartItem>,
    pub created_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            items: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Cart storage.
///
/// Creating a cart never replaces an existing one: every created cart is
/// kept, and reads and writes go to the most recent cart of the user.
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Creates an empty cart for the user.
    async fn create_cart(&self, user_id: UserId) -> Result<Cart>;

    /// Returns the user's most recent cart.
    async fn get_cart(&self, user_id: UserId) -> Result<Option<Cart>>;

    /// Removes every item from the user's cart.
    async fn clear_cart(&self, user_id: UserId) -> Result<()>;

    /// Appends an item to the user's cart and returns the updated cart.
    async fn add_item(&self, user_id: UserId, item: CartItem) -> Result<Cart>;

    /// Removes the line still waiting on `request_id`. Returns whether such a
    /// line was found.
    async fn remove_pending(&self, request_id: RequestId) -> Result<bool>;

    /// Removes the given lines from any of the user's carts, leaving every
    /// other line in place. Returns how many were removed.
    async fn remove_lines(&self, user_id: UserId, line_ids: &[LineId]) -> Result<usize>;

    /// Sets the product name on the line waiting for `request_id` and clears
    /// its pending request. Returns whether such a line was found.
    async fn attach_product_name(&self, request_id: RequestId, name: String) -> Result<bool>;

    /// Number of carts ever created for the user.
    async fn cart_count(&self, user_id: UserId) -> Result<usize>;
}

#[derive(Debug, Default)]
struct CartState {
    carts: HashMap<UserId, Vec<Cart>>,
    fail_on_create: bool,
}

impl CartState {
    fn latest_mut(&mut self, user_id: UserId) -> Result<&mut Cart> {
        self.carts
            .get_mut(&user_id)
            .and_then(|carts| carts.last_mut())
            .ok_or(DomainError::CartNotFound { user_id })
    }
}

/// In-memory cart repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartRepository {
    state: Arc<RwLock<CartState>>,
}

impl InMemoryCartRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures cart creation to fail.
    pub async fn set_fail_on_create(&self, fail: bool) {
        self.state.write().await.fail_on_create = fail;
    }
}

#[async_trait]
impl CartRepository for InMemoryCartRepository {
    async fn create_cart(&self, user_id: UserId) -> Result<Cart> {
        let mut state = self.state.write().await;

        if state.fail_on_create {
            return Err(DomainError::Repository(
                "cart storage unavailable".to_string(),
            ));
        }

        let cart = Cart::new(user_id);
        state.carts.entry(user_id).or_default().push(cart.clone());

        tracing::debug!(%user_id, "cart created");
        Ok(cart)
    }

    async fn get_cart(&self, user_id: UserId) -> Result<Option<Cart>> {
        let state = self.state.read().await;
        Ok(state
            .carts
            .get(&user_id)
            .and_then(|carts| carts.last())
            .cloned())
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<()> {
        let mut state = self.state.write().await;
        state.latest_mut(user_id)?.items.clear();
        Ok(())
    }

    async fn add_item(&self, user_id: UserId, item: CartItem) -> Result<Cart> {
        let mut state = self.state.write().await;
        let cart = state.latest_mut(user_id)?;
        cart.items.push(item);
        Ok(cart.clone())
    }

    async fn remove_pending(&self, request_id: RequestId) -> Result<bool> {
        let mut state = self.state.write().await;

        for cart in state.carts.values_mut().flatten() {
            if let Some(index) = cart
                .items
                .iter()
                .position(|i| i.pending_request == Some(request_id))
            {
                cart.items.remove(index);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn remove_lines(&self, user_id: UserId, line_ids: &[LineId]) -> Result<usize> {
        let mut state = self.state.write().await;
        let carts = state
            .carts
            .get_mut(&user_id)
            .ok_or(DomainError::CartNotFound { user_id })?;

        let mut removed = 0;
        for cart in carts.iter_mut() {
            let before = cart.items.len();
            cart.items.retain(|i| !line_ids.contains(&i.line_id));
            removed += before - cart.items.len();
        }
        Ok(removed)
    }

    async fn attach_product_name(&self, request_id: RequestId, name: String) -> Result<bool> {
        let mut state = self.state.write().await;

        let item = state
            .carts
            .values_mut()
            .flatten()
            .flat_map(|cart| cart.items.iter_mut())
            .find(|item| item.pending_request == Some(request_id));

        match item {
            Some(item) => {
                item.product_name = Some(name);
                item.pending_request = None;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn cart_count(&self, user_id: UserId) -> Result<usize> {
        let state = self.state.read().await;
        Ok(state.carts.get(&user_id).map_or(0, Vec::len))
    }
}
