//! Shared primitives for the replay engine
//!
//! Every crate in the workspace speaks in terms of these types:
//! - [`Action`] and [`ActionParams`]: one recorded interaction
//! - [`Locator`]: capture-time description of the target element
//! - [`ExecutionResult`]: outcome of one action, with diagnostics on failure

pub mod action;
pub mod errors;
pub mod locator;
pub mod result;

pub use action::*;
pub use errors::CoreError;
pub use locator::*;
pub use result::*;

use std::fmt;

use uuid::Uuid;

/// Identifier of a single workflow run.
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
