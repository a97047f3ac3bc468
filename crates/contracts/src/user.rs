//! User service events.

use common::UserId;
use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::topics;

/// Published once per successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLoggedIn {
    /// The authenticated user.
    pub user_id: UserId,
    /// The user's email address.
    pub email: String,
}

impl Event for UserLoggedIn {
    const TOPIC: &'static str = topics::USER_EVENTS;
    const EVENT_TYPE: &'static str = "UserLoggedIn";
}
