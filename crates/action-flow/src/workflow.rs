//! Workflow descriptors and the action library they reference

use crate::errors::FlowError;
use replay_core_types::{Action, ActionParams, Locator};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Reference to a library action, with per-step overrides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub action_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Merged key by key over the definition's params
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,

    /// Fields set here win over the definition's locator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<Locator>,
}

/// A workflow as stored: inline `actions`, or `steps` into an [`ActionLibrary`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDescriptor {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub actions: Vec<Action>,

    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
}

impl WorkflowDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_actions(mut self, actions: Vec<Action>) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_steps(mut self, steps: Vec<WorkflowStep>) -> Self {
        self.steps = steps;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, FlowError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, FlowError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Ordered, concrete actions: `steps` resolved through `library` when
    /// present, otherwise the inline `actions`.
    pub fn flatten(&self, library: &ActionLibrary) -> Result<Vec<Action>, FlowError> {
        if self.steps.is_empty() {
            return Ok(self.actions.clone());
        }
        if !self.actions.is_empty() {
            debug!(
                workflow = %self.name,
                inline = self.actions.len(),
                "workflow has both steps and inline actions; using steps"
            );
        }
        self.steps
            .iter()
            .enumerate()
            .map(|(index, step)| library.instantiate(index, step))
            .collect()
    }
}

/// Reusable action definitions keyed by id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionLibrary {
    definitions: HashMap<String, Action>,
}

impl ActionLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, action: Action) {
        self.definitions.insert(id.into(), action);
    }

    pub fn with(mut self, id: impl Into<String>, action: Action) -> Self {
        self.insert(id, action);
        self
    }

    pub fn get(&self, id: &str) -> Option<&Action> {
        self.definitions.get(id)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn from_json(json: &str) -> Result<Self, FlowError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, FlowError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Concrete action for `step`, overrides applied.
    pub fn instantiate(&self, index: usize, step: &WorkflowStep) -> Result<Action, FlowError> {
        let definition = self.get(&step.action_id).ok_or_else(|| {
            FlowError::ValidationFailed(format!(
                "step {} references missing action definition '{}'",
                index, step.action_id
            ))
        })?;

        let mut action = definition.clone();
        if let Some(name) = &step.name {
            action.name = name.clone();
        }
        if let Some(overrides) = &step.params {
            action.params = merge_params(&action.params, overrides).map_err(|e| {
                FlowError::ValidationFailed(format!(
                    "step {} has invalid params for '{}': {}",
                    index, step.action_id, e
                ))
            })?;
        }
        if let Some(selector) = &step.selector {
            action.selector = Some(selector.clone());
        }
        if let Some(locator) = &step.locator {
            action.locator = Some(match action.locator.take() {
                Some(base) => locator.clone().merged_with(&base),
                None => locator.clone(),
            });
        }
        Ok(action)
    }
}

fn merge_params(base: &ActionParams, overrides: &Value) -> Result<ActionParams, serde_json::Error> {
    let mut merged = serde_json::to_value(base)?;
    match (merged.as_object_mut(), overrides.as_object()) {
        (Some(target), Some(source)) => {
            for (key, value) in source {
                if !value.is_null() {
                    target.insert(key.clone(), value.clone());
                }
            }
        }
        _ => {
            return Err(serde::de::Error::custom("params override must be an object"));
        }
    }
    serde_json::from_value(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use replay_core_types::ActionType;
    use serde_json::json;

    fn library() -> ActionLibrary {
        ActionLibrary::new()
            .with("open", Action::navigate("open", "https://example.test/login"))
            .with(
                "login-button",
                Action::click(
                    "click login",
                    Locator::default()
                        .with_text("Log In")
                        .with_relative_position(50.0, 40.0),
                ),
            )
            .with(
                "username",
                Action::type_text("username", "{{user}}", Locator::default().with_text("User")),
            )
    }

    #[test]
    fn steps_resolve_through_library() {
        let workflow = WorkflowDescriptor::new("login").with_steps(vec![
            WorkflowStep {
                action_id: "open".into(),
                ..WorkflowStep::default()
            },
            WorkflowStep {
                action_id: "username".into(),
                name: Some("type user".into()),
                params: Some(json!({ "text": "ada", "url": null })),
                ..WorkflowStep::default()
            },
            WorkflowStep {
                action_id: "login-button".into(),
                selector: Some("#login".into()),
                locator: Some(Locator::default().with_relative_position(60.0, 45.0)),
                ..WorkflowStep::default()
            },
        ]);

        let actions = workflow.flatten(&library()).unwrap();
        assert_eq!(actions.len(), 3);
        assert_eq!(actions[0].action_type, ActionType::Navigate);
        assert_eq!(actions[1].name, "type user");
        assert_eq!(actions[1].params.text.as_deref(), Some("ada"));
        assert_eq!(actions[2].selector.as_deref(), Some("#login"));

        let locator = actions[2].locator.as_ref().unwrap();
        assert_eq!(locator.text.as_deref(), Some("Log In"));
        assert_eq!(locator.relative_position.unwrap().x, 60.0);
    }

    #[test]
    fn missing_definition_fails_validation() {
        let workflow = WorkflowDescriptor::new("broken").with_steps(vec![WorkflowStep {
            action_id: "nope".into(),
            ..WorkflowStep::default()
        }]);
        let err = workflow.flatten(&library()).unwrap_err();
        assert!(matches!(err, FlowError::ValidationFailed(_)));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn inline_actions_from_yaml() {
        let yaml = r#"
name: publish
actions:
  - name: open editor
    type: navigate
    params:
      url: https://example.test/new
      wait_policy: network_idle
  - name: pause
    type: wait
    params:
      duration_ms: 250
"#;
        let workflow = WorkflowDescriptor::from_yaml(yaml).unwrap();
        let actions = workflow.flatten(&ActionLibrary::new()).unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[1].params.duration_ms, Some(250));
    }

    #[test]
    fn library_from_json() {
        let json = r##"{"go": {"name": "go", "type": "click", "selector": "#go"}}"##;
        let library = ActionLibrary::from_json(json).unwrap();
        assert_eq!(library.len(), 1);
        assert_eq!(library.get("go").unwrap().selector.as_deref(), Some("#go"));
    }

    #[test]
    fn non_object_params_are_rejected() {
        let step = WorkflowStep {
            action_id: "open".into(),
            params: Some(json!(["not", "an", "object"])),
            ..WorkflowStep::default()
        };
        assert!(library().instantiate(0, &step).is_err());
    }
}
