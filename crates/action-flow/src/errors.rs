//! Workflow error types

use thiserror::Error;

/// Workflow errors
///
/// Only malformed workflows raise; everything that goes wrong while a
/// well-formed workflow runs ends up in the report instead.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Workflow validation failed
    #[error("Workflow validation failed: {0}")]
    ValidationFailed(String),

    /// Descriptor could not be parsed
    #[error("Invalid workflow descriptor: {0}")]
    Parse(String),

    /// Action primitive error
    #[error("Action primitive error: {0}")]
    ActionError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<action_primitives::ActionError> for FlowError {
    fn from(err: action_primitives::ActionError) -> Self {
        FlowError::ActionError(err.to_string())
    }
}

impl From<replay_core_types::CoreError> for FlowError {
    fn from(err: replay_core_types::CoreError) -> Self {
        FlowError::ValidationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for FlowError {
    fn from(err: serde_json::Error) -> Self {
        FlowError::Parse(err.to_string())
    }
}

impl From<serde_yaml::Error> for FlowError {
    fn from(err: serde_yaml::Error) -> Self {
        FlowError::Parse(err.to_string())
    }
}
