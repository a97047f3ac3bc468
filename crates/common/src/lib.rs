//! Identifier types shared by every service in the workspace.

pub mod types;

pub use types::{ProductId, RequestId, UserId};
