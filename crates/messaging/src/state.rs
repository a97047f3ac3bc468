//! Consumer lifecycle state machine.

use serde::{Deserialize, Serialize};

/// The state of a topic consumer.
///
/// State transitions:
/// ```text
/// NotStarted ──► Probing ──┬──► Consuming ◄──► Recovering
///                          │        │
///                          │        ├──► Faulted
///                          │        └──► Stopped
///                          └──► Disabled
/// ```
/// Cancellation moves any non-terminal state to `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ConsumerState {
    /// The consumer task has not run yet.
    #[default]
    NotStarted,

    /// Waiting for the broker to answer the readiness probe.
    Probing,

    /// Polling and dispatching messages.
    Consuming,

    /// Waiting out a transient broker error.
    Recovering,

    /// A fatal poll error stopped the loop (terminal state).
    Faulted,

    /// Cancelled by shutdown (terminal state).
    Stopped,

    /// The readiness probe gave up; the consumer never started (terminal state).
    Disabled,
}

impl ConsumerState {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConsumerState::Faulted | ConsumerState::Stopped | ConsumerState::Disabled
        )
    }

    /// Returns true if the consumer is running or about to.
    pub fn is_healthy(&self) -> bool {
        matches!(
            self,
            ConsumerState::NotStarted
                | ConsumerState::Probing
                | ConsumerState::Consuming
                | ConsumerState::Recovering
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsumerState::NotStarted => "NotStarted",
            ConsumerState::Probing => "Probing",
            ConsumerState::Consuming => "Consuming",
            ConsumerState::Recovering => "Recovering",
            ConsumerState::Faulted => "Faulted",
            ConsumerState::Stopped => "Stopped",
            ConsumerState::Disabled => "Disabled",
        }
    }
}

impl std::fmt::Display for ConsumerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_not_started() {
        assert_eq!(ConsumerState::default(), ConsumerState::NotStarted);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!ConsumerState::Probing.is_terminal());
        assert!(!ConsumerState::Consuming.is_terminal());
        assert!(!ConsumerState::Recovering.is_terminal());
        assert!(ConsumerState::Faulted.is_terminal());
        assert!(ConsumerState::Stopped.is_terminal());
        assert!(ConsumerState::Disabled.is_terminal());
    }

    #[test]
    fn test_healthy_states() {
        assert!(ConsumerState::Consuming.is_healthy());
        assert!(ConsumerState::Recovering.is_healthy());
        assert!(!ConsumerState::Faulted.is_healthy());
        assert!(!ConsumerState::Disabled.is_healthy());
    }

    #[test]
    fn test_display() {
        assert_eq!(ConsumerState::Recovering.to_string(), "Recovering");
        assert_eq!(ConsumerState::Disabled.to_string(), "Disabled");
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_string(&ConsumerState::Consuming).unwrap();
        assert_eq!(json, "\"Consuming\"");
    }
}
