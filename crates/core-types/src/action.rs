//! Recorded actions

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{errors::CoreError, locator::Locator};

/// Kind of interaction an action performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Navigate,
    Click,
    Type,
    Wait,
    Scroll,
    Upload,
    Screenshot,
    Extract,
    Submit,
}

impl ActionType {
    pub fn name(&self) -> &'static str {
        match self {
            ActionType::Navigate => "navigate",
            ActionType::Click => "click",
            ActionType::Type => "type",
            ActionType::Wait => "wait",
            ActionType::Scroll => "scroll",
            ActionType::Upload => "upload",
            ActionType::Screenshot => "screenshot",
            ActionType::Extract => "extract",
            ActionType::Submit => "submit",
        }
    }

    /// Actions that go through element resolution and the retry controller.
    pub fn needs_resolution(&self) -> bool {
        matches!(
            self,
            ActionType::Click | ActionType::Type | ActionType::Upload | ActionType::Submit
        )
    }

    /// Actions allowed to fall back to raw coordinate replay.
    pub fn allows_coordinate_replay(&self) -> bool {
        matches!(
            self,
            ActionType::Click | ActionType::Type | ActionType::Submit
        )
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Page readiness to wait for after navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitPolicy {
    /// Return as soon as the navigation is committed
    None,

    /// Wait for DOMContentLoaded
    #[default]
    DomContentLoaded,

    /// Wait for the load event
    Load,

    /// Wait for the load event plus network quiet
    NetworkIdle,
}

/// Type-specific parameters of an action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Local path or http(s) URL of the file to upload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_x: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_y: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_policy: Option<WaitPolicy>,

    /// Key pressed by a submit action that has no target element
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Binding that receives the value read by an extract action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,

    /// Locator fields carried inside the parameters by some recordings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<Locator>,
}

/// One recorded interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub name: String,

    #[serde(rename = "type")]
    pub action_type: ActionType,

    #[serde(default)]
    pub params: ActionParams,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<Locator>,

    /// Literal structural hint (CSS selector) recorded alongside the locator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

impl Action {
    pub fn new(name: impl Into<String>, action_type: ActionType) -> Self {
        Self {
            name: name.into(),
            action_type,
            params: ActionParams::default(),
            locator: None,
            selector: None,
        }
    }

    pub fn navigate(name: impl Into<String>, url: impl Into<String>) -> Self {
        let mut action = Self::new(name, ActionType::Navigate);
        action.params.url = Some(url.into());
        action
    }

    pub fn click(name: impl Into<String>, locator: Locator) -> Self {
        Self::new(name, ActionType::Click).with_locator(locator)
    }

    pub fn type_text(name: impl Into<String>, text: impl Into<String>, locator: Locator) -> Self {
        let mut action = Self::new(name, ActionType::Type).with_locator(locator);
        action.params.text = Some(text.into());
        action
    }

    pub fn wait(name: impl Into<String>, duration_ms: u64) -> Self {
        let mut action = Self::new(name, ActionType::Wait);
        action.params.duration_ms = Some(duration_ms);
        action
    }

    pub fn upload(name: impl Into<String>, file_path: impl Into<String>) -> Self {
        let mut action = Self::new(name, ActionType::Upload);
        action.params.file_path = Some(file_path.into());
        action
    }

    pub fn with_locator(mut self, locator: Locator) -> Self {
        self.locator = Some(locator);
        self
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn with_params(mut self, params: ActionParams) -> Self {
        self.params = params;
        self
    }

    /// Non-blank selector hint.
    pub fn selector(&self) -> Option<&str> {
        self.selector
            .as_deref()
            .map(str::trim)
            .filter(|selector| !selector.is_empty())
    }

    /// Fold `params.locator` into the top-level locator.
    ///
    /// Top-level fields take precedence field by field; nested fields only
    /// fill gaps.
    pub fn normalized(mut self) -> Self {
        if let Some(nested) = self.params.locator.take() {
            self.locator = Some(match self.locator.take() {
                Some(top) => top.merged_with(&nested),
                None => nested,
            });
        }
        self
    }

    /// Copy of this action with `f` applied to every text-bearing field.
    pub fn map_text<F>(&self, f: F) -> Action
    where
        F: Fn(&str) -> String,
    {
        let mut action = self.clone();
        let apply = |value: &mut Option<String>| {
            if let Some(inner) = value.as_mut() {
                *inner = f(inner);
            }
        };
        apply(&mut action.params.url);
        apply(&mut action.params.text);
        apply(&mut action.params.file_path);
        apply(&mut action.params.key);
        apply(&mut action.selector);
        if let Some(locator) = action.locator.as_mut() {
            apply(&mut locator.text);
        }
        if let Some(locator) = action.params.locator.as_mut() {
            apply(&mut locator.text);
        }
        action
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.name.trim().is_empty() {
            return Err(CoreError::invalid_action(
                self.action_type.name(),
                "action name cannot be empty",
            ));
        }

        let missing = |what: &str| CoreError::invalid_action(&self.name, format!("missing {}", what));
        let blank = |value: &Option<String>| {
            value
                .as_deref()
                .map(|v| v.trim().is_empty())
                .unwrap_or(true)
        };

        match self.action_type {
            ActionType::Navigate if blank(&self.params.url) => return Err(missing("url")),
            ActionType::Type if self.params.text.is_none() => return Err(missing("text")),
            ActionType::Upload if blank(&self.params.file_path) => {
                return Err(missing("file_path"))
            }
            ActionType::Extract if blank(&self.params.variable) => {
                return Err(missing("variable"))
            }
            ActionType::Click | ActionType::Type
                if self.locator.is_none()
                    && self.params.locator.is_none()
                    && self.selector().is_none() =>
            {
                return Err(missing("locator or selector"))
            }
            _ => {}
        }

        if let Some(locator) = &self.locator {
            locator.validate()?;
        }
        if let Some(locator) = &self.params.locator {
            locator.validate()?;
        }
        Ok(())
    }
}
