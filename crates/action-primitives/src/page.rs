//! The injected page automation capability

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;

use crate::{
    errors::ActionError,
    types::{BoundingBox, ElementHandle},
    WaitPolicy,
};

/// Page automation capability
///
/// One instance is bound to one render surface. The engine issues calls
/// strictly sequentially; implementations do not need to handle concurrent
/// interaction calls against the same surface.
#[async_trait]
pub trait PageAutomation: Send + Sync {
    /// Navigate the surface to `url` and wait according to `wait`
    async fn navigate(&self, url: &str, wait: WaitPolicy) -> Result<(), ActionError>;

    /// Move the pointer to page coordinates without clicking
    async fn hover(&self, x: f64, y: f64) -> Result<(), ActionError>;

    /// Click at page coordinates
    async fn click(&self, x: f64, y: f64) -> Result<(), ActionError>;

    /// Type into the focused element
    async fn type_text(&self, text: &str) -> Result<(), ActionError>;

    /// Press a named key (e.g. `Enter`)
    async fn press_key(&self, key: &str) -> Result<(), ActionError>;

    /// Scroll the viewport by a delta
    async fn scroll(&self, dx: f64, dy: f64) -> Result<(), ActionError>;

    /// PNG of the viewport, or of `region` when given
    async fn screenshot(&self, region: Option<BoundingBox>) -> Result<Vec<u8>, ActionError>;

    /// Evaluate a script in the page and return its JSON result
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, ActionError>;

    /// Set a local file on a file input without opening a picker
    async fn set_file(&self, input: &ElementHandle, path: &Path) -> Result<(), ActionError>;

    /// Sleep on behalf of the page; surfaces with their own clock may override
    async fn wait(&self, ms: u64) -> Result<(), ActionError> {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(())
    }
}

/// Evaluate `script` and deserialize the result.
pub async fn evaluate_as<T>(page: &dyn PageAutomation, script: &str) -> Result<T, ActionError>
where
    T: DeserializeOwned,
{
    let value = page.evaluate(script).await?;
    Ok(serde_json::from_value(value)?)
}
