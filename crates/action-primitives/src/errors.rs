//! Error types for page automation calls

use replay_core_types::FailureKind;
use thiserror::Error;

/// Failure raised by the injected page automation capability
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ActionError {
    /// Navigation timed out waiting for the requested readiness
    #[error("Navigation timeout: {0}")]
    NavTimeout(String),

    /// Wait operation timed out
    #[error("Wait timeout: {0}")]
    WaitTimeout(String),

    /// Operation was cancelled or interrupted
    #[error("Operation interrupted: {0}")]
    Interrupted(String),

    /// Element handle no longer resolves to a live element
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Element exists but cannot receive the interaction
    #[error("Element not interactable: {0}")]
    NotInteractable(String),

    /// Script evaluation failed or returned an unexpected shape
    #[error("Script error: {0}")]
    Script(String),

    /// Local file I/O or download failure
    #[error("I/O error: {0}")]
    Io(String),

    /// Transport to the render surface failed
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ActionError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ActionError::WaitTimeout(_)
                | ActionError::NotInteractable(_)
                | ActionError::ElementNotFound(_)
                | ActionError::Protocol(_)
        )
    }

    /// Failure classification for this capability error
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            ActionError::NavTimeout(_) | ActionError::WaitTimeout(_) => FailureKind::Timeout,
            ActionError::ElementNotFound(_) => FailureKind::ElementNotFound,
            _ => FailureKind::Unknown,
        }
    }
}

impl From<serde_json::Error> for ActionError {
    fn from(err: serde_json::Error) -> Self {
        ActionError::Script(format!("unexpected script result: {}", err))
    }
}

impl From<std::io::Error> for ActionError {
    fn from(err: std::io::Error) -> Self {
        ActionError::Io(err.to_string())
    }
}
