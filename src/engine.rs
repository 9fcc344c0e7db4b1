//! Engine facade wiring resolver, retry controller and orchestrator

use crate::config::ReplayConfig;
use crate::errors::Result;
use action_flow::{
    ActionLibrary, RetryController, RunControl, RunOutcome, WorkflowDescriptor,
    WorkflowOrchestrator,
};
use action_locator::{DefaultElementResolver, ElementResolver};
use action_primitives::PageAutomation;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

pub struct ReplayEngine {
    config: ReplayConfig,
    orchestrator: WorkflowOrchestrator,
}

impl ReplayEngine {
    /// Engine with the default layered resolver.
    pub fn new(config: ReplayConfig, page: Arc<dyn PageAutomation>) -> Result<Self> {
        config.validate()?;
        let resolver = Arc::new(DefaultElementResolver::new(
            page.clone(),
            config.resolver.clone(),
        )?);
        Ok(Self::with_resolver(config, page, resolver))
    }

    /// Engine with a caller-supplied resolver.
    pub fn with_resolver(
        config: ReplayConfig,
        page: Arc<dyn PageAutomation>,
        resolver: Arc<dyn ElementResolver>,
    ) -> Self {
        let retry = Arc::new(RetryController::new(
            resolver,
            page.clone(),
            config.retry.clone(),
        ));
        let orchestrator = WorkflowOrchestrator::new(page, retry, config.orchestrator.clone());
        Self {
            config,
            orchestrator,
        }
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// Pause/resume/stop handle for runs of this engine
    pub fn control(&self) -> RunControl {
        self.orchestrator.control()
    }

    /// Flatten and run `workflow`. Malformed workflows produce a failed
    /// report rather than an error.
    pub async fn run(
        &self,
        workflow: &WorkflowDescriptor,
        library: &ActionLibrary,
        bindings: HashMap<String, String>,
    ) -> RunOutcome {
        match workflow.flatten(library) {
            Ok(actions) => {
                info!(workflow = %workflow.name, actions = actions.len(), "replaying workflow");
                self.orchestrator
                    .run(&workflow.name, &actions, bindings)
                    .await
            }
            Err(err) => {
                error!(workflow = %workflow.name, error = %err, "workflow could not be flattened");
                self.orchestrator
                    .reject(&workflow.name, err.to_string(), bindings)
            }
        }
    }
}
