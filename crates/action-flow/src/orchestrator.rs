//! Workflow orchestrator: sequences actions and builds the run report

use crate::{
    diagnostics::capture_diagnostics,
    errors::FlowError,
    report::{ActionReportEntry, WorkflowReport},
    retry::RetryController,
    stats::ResolverStats,
    state::{RunControl, RunStatus},
    variables::substitute_action,
};
use action_locator::CandidateFinder;
use action_primitives::{evaluate_as, scripts, ActionError, PageAutomation, Tempo, TempoPlan};
use perceiver_visual::encode_base64;
use replay_core_types::{Action, ActionType, ExecutionResult, ResolutionMethod};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Orchestrator behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorSettings {
    /// End the run at the first failed action
    pub stop_on_error: bool,

    pub inter_action_min_ms: u64,
    pub inter_action_max_ms: u64,

    /// Viewport screenshots before and after every action
    pub capture_screenshots: bool,

    /// Upper bound on how long a paused run sleeps between checks
    pub pause_poll_ms: u64,

    /// Fixed seed for the inter-action delay
    pub seed: Option<u64>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            stop_on_error: true,
            inter_action_min_ms: 500,
            inter_action_max_ms: 1500,
            capture_screenshots: false,
            pause_poll_ms: 100,
            seed: None,
        }
    }
}

impl OrchestratorSettings {
    /// No inter-action delay; for tests.
    pub fn instant() -> Self {
        Self {
            inter_action_min_ms: 0,
            inter_action_max_ms: 0,
            pause_poll_ms: 10,
            seed: Some(0),
            ..Self::default()
        }
    }

    fn tempo_plan(&self) -> TempoPlan {
        TempoPlan {
            inter_action_min_ms: self.inter_action_min_ms,
            inter_action_max_ms: self.inter_action_max_ms,
            seed: self.seed,
            ..TempoPlan::default()
        }
    }
}

/// Everything a finished run produces
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: WorkflowReport,
    pub stats: ResolverStats,
    pub bindings: HashMap<String, String>,
}

pub struct WorkflowOrchestrator {
    page: Arc<dyn PageAutomation>,
    retry: Arc<RetryController>,
    finder: CandidateFinder,
    tempo: Tempo,
    settings: OrchestratorSettings,
    control: RunControl,
}

impl WorkflowOrchestrator {
    pub fn new(
        page: Arc<dyn PageAutomation>,
        retry: Arc<RetryController>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            finder: CandidateFinder::new(page.clone()),
            tempo: Tempo::new(settings.tempo_plan()),
            page,
            retry,
            settings,
            control: RunControl::new(),
        }
    }

    /// Handle for pausing, resuming or stopping runs of this orchestrator
    pub fn control(&self) -> RunControl {
        self.control.clone()
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Reject empty workflows and invalid actions before anything runs.
    pub fn validate(&self, actions: &[Action]) -> Result<(), FlowError> {
        if actions.is_empty() {
            return Err(FlowError::ValidationFailed(
                "workflow has no actions".to_string(),
            ));
        }
        for (index, action) in actions.iter().enumerate() {
            action.validate().map_err(|e| {
                FlowError::ValidationFailed(format!("action {} ('{}'): {}", index, action.name, e))
            })?;
        }
        Ok(())
    }

    /// Run `actions` in order. Never fails: problems end up in the report.
    pub async fn run(
        &self,
        workflow_name: &str,
        actions: &[Action],
        bindings: HashMap<String, String>,
    ) -> RunOutcome {
        if let Err(err) = self.validate(actions) {
            return self.reject(workflow_name, err.to_string(), bindings);
        }

        self.control.begin(bindings);
        self.retry.reset_stats();
        let mut report = WorkflowReport::new(workflow_name);

        info!(
            workflow = %workflow_name,
            run_id = %report.run_id,
            actions = actions.len(),
            "starting workflow"
        );

        let poll = Duration::from_millis(self.settings.pause_poll_ms.max(1));
        let mut status = RunStatus::Completed;

        for (index, action) in actions.iter().enumerate() {
            if self.control.is_stopped() {
                status = RunStatus::Stopped;
                break;
            }
            self.control.set_index(index);

            if self.control.has_breakpoint(index) {
                info!(index, action = %action.name, "breakpoint reached");
                self.control.pause();
            }
            if !self.control.wait_while_paused(poll).await {
                status = RunStatus::Stopped;
                break;
            }
            self.control.set_status(RunStatus::Running);

            let concrete = substitute_action(action, &self.control.bindings());
            let succeeded = self.run_action(index, &concrete, &mut report).await;

            if !succeeded && self.settings.stop_on_error {
                warn!(index, action = %action.name, "stopping at failed action");
                status = RunStatus::Failed;
                break;
            }

            let is_last = index + 1 == actions.len();
            if !is_last
                && action.action_type != ActionType::Wait
                && !self.inter_action_pause().await
            {
                status = RunStatus::Stopped;
                break;
            }
        }

        if self.control.is_stopped() {
            status = RunStatus::Stopped;
        }
        self.finish(report, status)
    }

    /// Record a workflow that cannot run as a failed run without executing anything.
    pub fn reject(
        &self,
        workflow_name: &str,
        reason: impl Into<String>,
        bindings: HashMap<String, String>,
    ) -> RunOutcome {
        let reason = reason.into();
        warn!(workflow = %workflow_name, error = %reason, "workflow rejected");
        self.control.begin(bindings);
        self.retry.reset_stats();
        let mut report = WorkflowReport::new(workflow_name);
        report.log_error(reason);
        self.finish(report, RunStatus::Failed)
    }

    fn finish(&self, report: WorkflowReport, status: RunStatus) -> RunOutcome {
        self.control.set_status(status);
        let report = report.finish(status);
        info!(
            workflow = %report.workflow_name,
            status = %status,
            succeeded = report.succeeded,
            failed = report.failed,
            duration_ms = report.duration_ms,
            "workflow finished"
        );
        RunOutcome {
            report,
            stats: self.retry.stats(),
            bindings: self.control.bindings(),
        }
    }

    /// Execute one action and append its entry. Returns whether it succeeded.
    async fn run_action(&self, index: usize, action: &Action, report: &mut WorkflowReport) -> bool {
        debug!(index, action = %action.name, kind = %action.action_type, "executing action");

        let before = self.maybe_screenshot().await;
        let (result, capture) = self.execute_action(action).await;
        let after = self.maybe_screenshot().await;

        let mut entry = ActionReportEntry::new(index, &action.name, action.action_type, &result);
        entry.screenshot_before = before;
        entry.screenshot_after = after;
        entry.capture = capture;

        if result.success {
            info!(
                index,
                action = %action.name,
                method = %result.method,
                duration_ms = result.elapsed_ms,
                "action succeeded"
            );
        } else {
            warn!(
                index,
                action = %action.name,
                error = %result.error_message(),
                "action failed"
            );
        }

        let success = result.success;
        report.record(entry, &result);
        success
    }

    /// Dispatch by action type. Capability errors become failed results.
    pub async fn execute_action(&self, action: &Action) -> (ExecutionResult, Option<String>) {
        match action.action_type {
            ActionType::Click | ActionType::Type | ActionType::Upload | ActionType::Submit => {
                (self.retry.execute(action).await, None)
            }
            _ => {
                let started = Instant::now();
                let outcome = self.execute_direct(action).await;
                let elapsed = started.elapsed().as_millis() as u64;
                match outcome {
                    Ok(capture) => (
                        ExecutionResult::success(ResolutionMethod::Direct, None)
                            .with_elapsed(elapsed),
                        capture,
                    ),
                    Err(err) => {
                        let diagnostics = capture_diagnostics(self.page.as_ref()).await;
                        (
                            ExecutionResult::failure(err.to_string())
                                .with_failure_kind(err.failure_kind())
                                .with_diagnostics(diagnostics)
                                .with_elapsed(elapsed),
                            None,
                        )
                    }
                }
            }
        }
    }

    async fn execute_direct(&self, action: &Action) -> Result<Option<String>, ActionError> {
        let params = &action.params;
        match action.action_type {
            ActionType::Navigate => {
                let url = params.url.as_deref().unwrap_or_default();
                self.page
                    .navigate(url, params.wait_policy.unwrap_or_default())
                    .await?;
                Ok(None)
            }
            ActionType::Wait => {
                self.page.wait(params.duration_ms.unwrap_or(0)).await?;
                Ok(None)
            }
            ActionType::Scroll => {
                self.page
                    .scroll(params.scroll_x.unwrap_or(0.0), params.scroll_y.unwrap_or(0.0))
                    .await?;
                Ok(None)
            }
            ActionType::Screenshot => {
                let bytes = self.page.screenshot(None).await?;
                Ok(Some(encode_base64(&bytes)))
            }
            ActionType::Extract => {
                let value = self.extract(action).await?;
                if let Some(variable) = params.variable.as_deref() {
                    debug!(variable = %variable, "binding extracted value");
                    self.control.bind(variable, &value);
                }
                Ok(None)
            }
            other => Err(ActionError::Internal(format!(
                "{} actions require element resolution",
                other
            ))),
        }
    }

    async fn extract(&self, action: &Action) -> Result<String, ActionError> {
        if let Some(selector) = action.selector() {
            let value: Option<String> =
                evaluate_as(self.page.as_ref(), &scripts::extract_text(selector)).await?;
            return value.ok_or_else(|| {
                ActionError::ElementNotFound(format!("selector '{}' matched nothing", selector))
            });
        }

        let text = action
            .clone()
            .normalized()
            .locator
            .and_then(|l| l.text().map(str::to_string));
        match text {
            Some(text) => self
                .finder
                .find(&text)
                .await
                .into_iter()
                .next()
                .map(|candidate| candidate.text)
                .ok_or_else(|| {
                    ActionError::ElementNotFound(format!("no visible element contains '{}'", text))
                }),
            None => Err(ActionError::ElementNotFound(
                "extract needs a selector or locator text".to_string(),
            )),
        }
    }

    async fn maybe_screenshot(&self) -> Option<String> {
        if !self.settings.capture_screenshots {
            return None;
        }
        match self.page.screenshot(None).await {
            Ok(bytes) => Some(encode_base64(&bytes)),
            Err(err) => {
                debug!(error = %err, "debug screenshot failed");
                None
            }
        }
    }

    /// Randomized pause between actions; `false` if the run was stopped.
    async fn inter_action_pause(&self) -> bool {
        let delay = self.tempo.inter_action_delay();
        if delay.is_zero() {
            return !self.control.is_stopped();
        }
        let token = self.control.token();
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = token.cancelled() => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use action_locator::{AttemptParams, ElementResolver};
    use action_primitives::fake::{element, FakeOp, FakePage, PageCall};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use replay_core_types::{FailureKind, Locator};

    /// Succeeds unless the action name starts with `fail`.
    struct NameResolver {
        seen: Mutex<Vec<Action>>,
    }

    #[async_trait]
    impl ElementResolver for NameResolver {
        async fn resolve(&self, action: &Action, _params: &AttemptParams) -> ExecutionResult {
            self.seen.lock().push(action.clone());
            if action.name.starts_with("fail") {
                ExecutionResult::failure("Element not found: nothing matched")
            } else {
                ExecutionResult::success(ResolutionMethod::Textual, Some(0.9))
            }
        }
    }

    fn orchestrator(
        page: Arc<FakePage>,
        settings: OrchestratorSettings,
    ) -> (WorkflowOrchestrator, Arc<NameResolver>) {
        let resolver = Arc::new(NameResolver {
            seen: Mutex::new(Vec::new()),
        });
        let retry = Arc::new(RetryController::new(
            resolver.clone(),
            page.clone(),
            RetryPolicy {
                max_retries: 1,
                ..RetryPolicy::default()
            }
            .without_delay(),
        ));
        (WorkflowOrchestrator::new(page, retry, settings), resolver)
    }

    fn click(name: &str) -> Action {
        Action::click(name, Locator::default().with_text(name))
    }

    #[tokio::test]
    async fn stop_on_error_ends_at_first_failure() {
        let page = Arc::new(FakePage::new());
        let (orchestrator, _) = orchestrator(page, OrchestratorSettings::instant());
        let actions = vec![click("a"), click("b"), click("fail-c"), click("d"), click("e")];

        let outcome = orchestrator.run("wf", &actions, HashMap::new()).await;
        let report = outcome.report;
        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.entries.len(), 3);
        assert_eq!(report.failed, 1);
        assert_eq!(
            report.entries[2].failure_kind,
            Some(FailureKind::ElementNotFound)
        );
        assert_eq!(report.entries[2].retries, 1);
        assert_eq!(outcome.stats.total_attempts, 4);
    }

    #[tokio::test]
    async fn continue_on_error_runs_everything() {
        let page = Arc::new(FakePage::new());
        let settings = OrchestratorSettings {
            stop_on_error: false,
            ..OrchestratorSettings::instant()
        };
        let (orchestrator, _) = orchestrator(page, settings);
        let actions = vec![click("a"), click("fail-b"), click("c"), click("fail-d")];

        let report = orchestrator.run("wf", &actions, HashMap::new()).await.report;
        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.total, 4);
        assert_eq!(report.failed, 2);
        assert_eq!(report.success_rate, 50.0);
        assert_eq!(report.failures.len(), 2);
    }

    #[tokio::test]
    async fn direct_actions_and_variables() {
        let page = Arc::new(FakePage::new().with_extracted("#greeting", "Welcome back"));
        let (orchestrator, resolver) = orchestrator(page.clone(), OrchestratorSettings::instant());

        let mut extract = Action::new("read greeting", ActionType::Extract).with_selector("#greeting");
        extract.params.variable = Some("greeting".to_string());
        let actions = vec![
            Action::navigate("open", "https://{{host}}/login"),
            Action::type_text("user", "{{user}}", Locator::default().with_text("User")),
            Action::wait("settle", 5),
            extract,
            Action::type_text("echo", "{{greeting}} {{unknown}}", Locator::default().with_text("Note")),
        ];
        let bindings = HashMap::from([
            ("host".to_string(), "example.test".to_string()),
            ("user".to_string(), "ada".to_string()),
        ]);

        let outcome = orchestrator.run("wf", &actions, bindings).await;
        assert_eq!(outcome.report.status, RunStatus::Completed);
        assert_eq!(page.navigations(), vec!["https://example.test/login".to_string()]);
        assert!(page.calls().contains(&PageCall::Wait(5)));
        assert_eq!(outcome.bindings["greeting"], "Welcome back");

        let seen = resolver.seen.lock().clone();
        assert_eq!(seen[0].params.text.as_deref(), Some("ada"));
        assert_eq!(
            seen[1].params.text.as_deref(),
            Some("Welcome back {{unknown}}")
        );
        assert_eq!(outcome.report.entries[0].method, ResolutionMethod::Direct);
    }

    #[tokio::test]
    async fn capability_error_becomes_failed_entry() {
        let page = Arc::new(
            FakePage::new().fail(FakeOp::Navigate, ActionError::NavTimeout("30000ms".into())),
        );
        let (orchestrator, _) = orchestrator(page, OrchestratorSettings::instant());
        let outcome = orchestrator
            .run("wf", &[Action::navigate("open", "https://x.test")], HashMap::new())
            .await;
        let entry = &outcome.report.entries[0];
        assert!(!entry.success);
        assert_eq!(entry.failure_kind, Some(FailureKind::Timeout));
        assert!(outcome.report.failures[0].diagnostics.is_some());
        assert_eq!(outcome.report.status, RunStatus::Failed);
    }

    #[tokio::test]
    async fn extract_by_locator_text_and_screenshot_capture() {
        let page = Arc::new(
            FakePage::new()
                .with_elements(vec![element("r-1", "Order #123", 0.0, 0.0, 50.0, 10.0)])
                .with_screenshot(vec![7, 7, 7]),
        );
        let settings = OrchestratorSettings {
            capture_screenshots: true,
            ..OrchestratorSettings::instant()
        };
        let (orchestrator, _) = orchestrator(page, settings);
        let mut extract = Action::new("order", ActionType::Extract)
            .with_locator(Locator::default().with_text("Order #"));
        extract.params.variable = Some("order".to_string());
        let shot = Action::new("shot", ActionType::Screenshot);

        let outcome = orchestrator.run("wf", &[extract, shot], HashMap::new()).await;
        assert_eq!(outcome.bindings["order"], "Order #123");
        let entries = &outcome.report.entries;
        assert_eq!(entries[1].capture.as_deref(), Some("BwcH"));
        assert!(entries[0].screenshot_before.is_some());
        assert!(entries[0].screenshot_after.is_some());
    }

    #[tokio::test]
    async fn invalid_workflow_yields_failed_report() {
        let page = Arc::new(FakePage::new());
        let (orchestrator, _) = orchestrator(page.clone(), OrchestratorSettings::instant());

        let empty = orchestrator.run("wf", &[], HashMap::new()).await.report;
        assert_eq!(empty.status, RunStatus::Failed);
        assert_eq!(empty.error_log.len(), 1);
        assert_eq!(orchestrator.control().status(), RunStatus::Failed);

        let bad = Action::click(
            "bad",
            Locator::default().with_text("x").with_relative_position(140.0, 5.0),
        );
        let report = orchestrator.run("wf", &[bad], HashMap::new()).await.report;
        assert_eq!(report.status, RunStatus::Failed);
        assert!(report.entries.is_empty());
        assert!(page.calls().is_empty());

        let bindings = HashMap::from([("user".to_string(), "ada".to_string())]);
        let outcome = orchestrator.reject("wf", "step 'nope' is not in the library", bindings);
        assert_eq!(outcome.report.status, RunStatus::Failed);
        assert_eq!(outcome.bindings["user"], "ada");
        assert_eq!(orchestrator.control().status(), RunStatus::Failed);
    }

    #[tokio::test]
    async fn breakpoint_pauses_before_action() {
        let page = Arc::new(FakePage::new());
        let (orchestrator, resolver) = orchestrator(page, OrchestratorSettings::instant());
        let orchestrator = Arc::new(orchestrator);
        let control = orchestrator.control();
        control.add_breakpoint(2);

        let runner = orchestrator.clone();
        let handle = tokio::spawn(async move {
            let actions = vec![click("a"), click("b"), click("c"), click("d")];
            runner.run("wf", &actions, HashMap::new()).await
        });

        let mut waited = 0;
        while control.status() != RunStatus::Paused && waited < 200 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            waited += 1;
        }
        assert_eq!(control.status(), RunStatus::Paused);
        assert_eq!(control.current_index(), 2);
        assert_eq!(resolver.seen.lock().len(), 2);

        control.resume();
        let outcome = handle.await.unwrap();
        assert_eq!(outcome.report.status, RunStatus::Completed);
        assert_eq!(outcome.report.entries.len(), 4);
    }

    #[tokio::test]
    async fn stop_while_paused_leaves_rest_unexecuted() {
        let page = Arc::new(FakePage::new());
        let (orchestrator, resolver) = orchestrator(page, OrchestratorSettings::instant());
        let orchestrator = Arc::new(orchestrator);
        let control = orchestrator.control();
        control.add_breakpoint(1);

        let runner = orchestrator.clone();
        let handle = tokio::spawn(async move {
            let actions = vec![click("a"), click("b"), click("c")];
            runner.run("wf", &actions, HashMap::new()).await
        });

        let mut waited = 0;
        while control.status() != RunStatus::Paused && waited < 200 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            waited += 1;
        }
        control.stop();
        let outcome = handle.await.unwrap();
        assert_eq!(outcome.report.status, RunStatus::Stopped);
        assert_eq!(outcome.report.entries.len(), 1);
        assert_eq!(resolver.seen.lock().len(), 1);
        assert_eq!(control.status(), RunStatus::Stopped);
    }
}
