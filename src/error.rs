//! Rxn error types

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by reactive entities
#[derive(Debug, Error)]
pub enum RxnError {
    #[error("Rxn timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("{caller} is trying to modify a reactive owned by {owner}")]
    UnauthorizedMutation { owner: String, caller: String },

    #[error("Reactive source was dropped before the waiter resolved")]
    Disposed,
}

impl RxnError {
    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, RxnError::Timeout { .. })
    }

    /// Get the configured timeout if this is a timeout error
    pub fn timeout(&self) -> Option<Duration> {
        match self {
            RxnError::Timeout { timeout } => Some(*timeout),
            _ => None,
        }
    }
}

/// Result alias for reactive operations
pub type RxnResult<T> = Result<T, RxnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_carries_duration() {
        let err = RxnError::Timeout {
            timeout: Duration::from_millis(250),
        };
        assert!(err.is_timeout());
        assert_eq!(err.timeout(), Some(Duration::from_millis(250)));
        assert!(err.to_string().contains("250ms"));
    }

    #[test]
    fn test_unauthorized_mutation_message() {
        let err = RxnError::UnauthorizedMutation {
            owner: "src/player.rs".to_string(),
            caller: "src/hud.rs".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("src/player.rs"));
        assert!(msg.contains("src/hud.rs"));
        assert!(!err.is_timeout());
        assert_eq!(err.timeout(), None);
    }
}
