//! End-to-end replay through the engine facade against a scripted page

use action_primitives::fake::{element, FakePage, PageCall};
use replay_engine::{
    config::{load_config, ReplayConfig},
    render_html, Action, ActionLibrary, ActionType, FailureKind, Locator, OrchestratorSettings,
    ReplayEngine, ResolutionMethod, ResolverSettings, RetryPolicy, RunStatus, WorkflowDescriptor,
    WorkflowStep,
};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

fn fast_config() -> ReplayConfig {
    ReplayConfig {
        retry: RetryPolicy {
            max_retries: 1,
            ..RetryPolicy::default()
        }
        .without_delay(),
        orchestrator: OrchestratorSettings::instant(),
        resolver: ResolverSettings::instant(),
        ..ReplayConfig::default()
    }
}

fn login_page() -> Arc<FakePage> {
    Arc::new(FakePage::new().with_elements(vec![
        element("r-1", "Username", 100.0, 100.0, 200.0, 30.0),
        element("r-2", "Log In", 100.0, 200.0, 80.0, 30.0),
    ]))
}

fn login_library() -> ActionLibrary {
    ActionLibrary::new()
        .with("open", Action::navigate("open", "https://{{host}}/login"))
        .with(
            "username",
            Action::type_text("username", "{{user}}", Locator::default().with_text("Username")),
        )
        .with(
            "login",
            Action::click("login", Locator::default().with_text("Log In")),
        )
}

fn step(id: &str) -> WorkflowStep {
    WorkflowStep {
        action_id: id.to_string(),
        ..WorkflowStep::default()
    }
}

#[tokio::test]
async fn replays_login_workflow() {
    let page = login_page();
    let engine = ReplayEngine::new(fast_config(), page.clone()).unwrap();
    let workflow =
        WorkflowDescriptor::new("login").with_steps(vec![step("open"), step("username"), step("login")]);
    let bindings = HashMap::from([
        ("host".to_string(), "example.test".to_string()),
        ("user".to_string(), "ada".to_string()),
    ]);

    let outcome = engine.run(&workflow, &login_library(), bindings).await;
    let report = &outcome.report;
    assert_eq!(report.status, RunStatus::Completed, "{:?}", report.error_log);
    assert_eq!(report.total, 3);
    assert_eq!(report.success_rate, 100.0);
    assert_eq!(report.entries[0].method, ResolutionMethod::Direct);
    assert_eq!(report.entries[1].method, ResolutionMethod::Textual);
    assert_eq!(report.entries[2].method, ResolutionMethod::Textual);

    assert_eq!(page.navigations(), vec!["https://example.test/login".to_string()]);
    assert_eq!(page.typed(), vec!["ada".to_string()]);
    assert_eq!(page.clicks(), vec![(200.0, 115.0), (140.0, 215.0)]);
    assert_eq!(outcome.stats.successful_executions, 2);

    let html = render_html(report);
    assert!(html.contains("<h1>login</h1>"));
}

#[tokio::test]
async fn missing_element_fails_with_diagnostics() {
    let page = login_page();
    let engine = ReplayEngine::new(fast_config(), page.clone()).unwrap();
    let workflow = WorkflowDescriptor::new("publish").with_actions(vec![
        Action::click("publish", Locator::default().with_text("Publish")),
        Action::click("login", Locator::default().with_text("Log In")),
    ]);

    let outcome = engine.run(&workflow, &ActionLibrary::new(), HashMap::new()).await;
    let report = outcome.report;
    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.entries.len(), 1);
    assert_eq!(report.entries[0].retries, 1);
    assert_eq!(
        report.entries[0].failure_kind,
        Some(FailureKind::ElementNotFound)
    );
    let diagnostics = report.failures[0].diagnostics.as_ref().unwrap();
    assert!(diagnostics.screenshot.is_some());
    assert!(page.clicks().is_empty());
    assert!(page
        .calls()
        .iter()
        .any(|call| matches!(call, PageCall::Screenshot(None))));
}

#[tokio::test]
async fn unknown_step_yields_failed_report() {
    let engine = ReplayEngine::new(fast_config(), login_page()).unwrap();
    let workflow = WorkflowDescriptor::new("broken").with_steps(vec![step("open"), step("nope")]);

    let outcome = engine.run(&workflow, &login_library(), HashMap::new()).await;
    assert_eq!(outcome.report.status, RunStatus::Failed);
    assert!(outcome.report.entries.is_empty());
    assert!(outcome.report.error_log[0].contains("nope"));
    assert_eq!(engine.control().status(), RunStatus::Failed);
    assert!(engine.control().snapshot().started_at.is_some());
}

#[tokio::test]
async fn recorded_text_with_keywords_is_still_not_found() {
    let page = login_page();
    let engine = ReplayEngine::new(fast_config(), page.clone()).unwrap();
    let workflow = WorkflowDescriptor::new("settings").with_actions(vec![Action::click(
        "open session settings",
        Locator::default().with_text("Session timeout settings"),
    )]);

    let outcome = engine.run(&workflow, &ActionLibrary::new(), HashMap::new()).await;
    let entry = &outcome.report.entries[0];
    assert!(!entry.success);
    assert!(entry
        .error
        .as_deref()
        .unwrap()
        .contains("Session timeout settings"));
    assert_eq!(entry.failure_kind, Some(FailureKind::ElementNotFound));
    assert_eq!(engine.control().status(), RunStatus::Failed);
}

#[tokio::test]
async fn submit_falls_back_to_enter() {
    let page = login_page();
    let engine = ReplayEngine::new(fast_config(), page.clone()).unwrap();
    let workflow = WorkflowDescriptor::new("submit")
        .with_actions(vec![Action::new("send", ActionType::Submit)]);

    let outcome = engine.run(&workflow, &ActionLibrary::new(), HashMap::new()).await;
    assert_eq!(outcome.report.status, RunStatus::Completed);
    assert!(page.calls().contains(&PageCall::PressKey("Enter".to_string())));
}

#[test]
fn config_file_and_environment_layers() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
retry:
  max_retries: 5
  retry_delay_ms: 200
orchestrator:
  stop_on_error: false
resolver:
  upload:
    retries: 1
logging:
  level: debug
"#
    )
    .unwrap();

    std::env::set_var("REPLAY__ORCHESTRATOR__INTER_ACTION_MAX_MS", "900");
    let config = load_config(Some(file.path())).unwrap();
    std::env::remove_var("REPLAY__ORCHESTRATOR__INTER_ACTION_MAX_MS");

    assert_eq!(config.retry.max_retries, 5);
    assert_eq!(config.retry.retry_delay_ms, 200);
    assert_eq!(config.retry.initial_tolerance, 15.0);
    assert!(!config.orchestrator.stop_on_error);
    assert_eq!(config.orchestrator.inter_action_max_ms, 900);
    assert_eq!(config.resolver.upload.retries, 1);
    assert_eq!(config.resolver.submit_key, "Enter");
    assert_eq!(config.logging.level, "debug");
}
