//! Validation errors for the shared action model

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    /// Action is missing a parameter its type requires
    #[error("Action '{action}' is invalid: {reason}")]
    InvalidAction { action: String, reason: String },

    /// Locator violates its invariants
    #[error("Invalid locator: {0}")]
    InvalidLocator(String),
}

impl CoreError {
    pub fn invalid_action(action: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAction {
            action: action.into(),
            reason: reason.into(),
        }
    }
}
