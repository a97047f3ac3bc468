//! Login and the cart-provisioning trigger.

use std::sync::Arc;

use contracts::UserLoggedIn;
use domain::{DomainError, User, UserDirectory};

use crate::error::Result;
use crate::producer::EventProducer;

/// Authenticates users and announces each successful login.
#[derive(Clone)]
pub struct LoginService {
    users: Arc<dyn UserDirectory>,
    producer: EventProducer,
}

impl LoginService {
    pub fn new(users: Arc<dyn UserDirectory>, producer: EventProducer) -> Self {
        Self { users, producer }
    }

    /// Checks the credentials and publishes [`UserLoggedIn`].
    ///
    /// Every successful login publishes, so logging in twice provisions two
    /// carts downstream. A failed publish fails the login.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        let user = self
            .users
            .authenticate(username, password)
            .await?
            .ok_or(DomainError::InvalidCredentials)?;

        self.producer
            .publish(&UserLoggedIn {
                user_id: user.id,
                email: user.email.clone(),
            })
            .await?;

        tracing::info!(user_id = %user.id, "user logged in");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MessagingError;
    use broker::InMemoryBroker;
    use common::UserId;
    use contracts::topics;
    use domain::InMemoryUserDirectory;

    async fn setup() -> (InMemoryBroker, LoginService) {
        let broker = InMemoryBroker::new();
        let users = InMemoryUserDirectory::new();
        users
            .register(
                User {
                    id: UserId::new(99),
                    username: "alice".to_string(),
                    email: "alice@example.com".to_string(),
                },
                "secret",
            )
            .await;
        let service = LoginService::new(
            Arc::new(users),
            EventProducer::new(Arc::new(broker.clone())),
        );
        (broker, service)
    }

    #[tokio::test]
    async fn test_login_publishes_event() {
        let (broker, service) = setup().await;

        let user = service.login("alice", "secret").await.unwrap();

        assert_eq!(user.id, UserId::new(99));
        assert_eq!(
            broker.decoded::<UserLoggedIn>(topics::USER_EVENTS),
            vec![UserLoggedIn {
                user_id: UserId::new(99),
                email: "alice@example.com".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_invalid_credentials_publish_nothing() {
        let (broker, service) = setup().await;

        let result = service.login("alice", "wrong").await;

        assert!(matches!(
            result,
            Err(MessagingError::Domain(DomainError::InvalidCredentials))
        ));
        assert!(broker.messages(topics::USER_EVENTS).is_empty());
    }

    #[tokio::test]
    async fn test_publish_failure_fails_login() {
        let (broker, service) = setup().await;
        broker.set_available(false);

        let result = service.login("alice", "secret").await;
        assert!(result.unwrap_err().is_publish_failure());
    }
}
