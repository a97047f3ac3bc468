//! User accounts and credential checks.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::UserId;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::Result;

/// A registered user. Credentials never leave the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Returns the user when `username` exists and `password` matches.
    async fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>>;
}

#[derive(Debug)]
struct Account {
    user: User,
    password: String,
}

/// In-memory user directory keyed by username.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserDirectory {
    accounts: Arc<RwLock<HashMap<String, Account>>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user, replacing any account with the same username.
    pub async fn register(&self, user: User, password: impl Into<String>) {
        self.accounts.write().await.insert(
            user.username.clone(),
            Account {
                user,
                password: password.into(),
            },
        );
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .get(username)
            .filter(|account| account.password == password)
            .map(|account| account.user.clone()))
    }
}
