//! Error types for locator system

use action_primitives::ActionError;
use replay_core_types::FailureKind;
use thiserror::Error;

/// Locator error enumeration
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LocatorError {
    /// No file input or other required element on the page
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Every strategy missed; `kind` is the most specific miss seen
    #[error("Element not found: {detail}")]
    Unresolved { kind: FailureKind, detail: String },

    /// Locator or action is missing data a strategy needs
    #[error("Invalid locator: {0}")]
    InvalidLocator(String),

    /// Page automation capability error
    #[error("Page error: {0}")]
    Page(ActionError),

    /// Local upload source is missing or unreadable
    #[error("Upload failed: {0}")]
    Upload(String),

    /// Remote upload source could not be fetched
    #[error("Download failed: {0}")]
    Download(String),

    /// Timeout during resolution
    #[error("Resolution timeout: {0}")]
    Timeout(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LocatorError {
    /// Whether another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            LocatorError::ElementNotFound(_)
            | LocatorError::Unresolved { .. }
            | LocatorError::Download(_)
            | LocatorError::Timeout(_) => true,
            LocatorError::Page(err) => err.is_retryable(),
            LocatorError::InvalidLocator(_)
            | LocatorError::Upload(_)
            | LocatorError::Internal(_) => false,
        }
    }

    /// Failure classification, taken from the variant and never from message text
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            LocatorError::ElementNotFound(_) => FailureKind::ElementNotFound,
            LocatorError::Unresolved { kind, .. } => *kind,
            LocatorError::Page(err) => err.failure_kind(),
            LocatorError::Timeout(_) => FailureKind::Timeout,
            LocatorError::InvalidLocator(_)
            | LocatorError::Upload(_)
            | LocatorError::Download(_)
            | LocatorError::Internal(_) => FailureKind::Unknown,
        }
    }
}

impl From<ActionError> for LocatorError {
    fn from(err: ActionError) -> Self {
        match err {
            ActionError::WaitTimeout(msg) | ActionError::NavTimeout(msg) => {
                LocatorError::Timeout(msg)
            }
            other => LocatorError::Page(other),
        }
    }
}

impl From<std::io::Error> for LocatorError {
    fn from(err: std::io::Error) -> Self {
        LocatorError::Upload(err.to_string())
    }
}
