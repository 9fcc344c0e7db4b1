//! Workflow execution layer
//!
//! Turns a workflow descriptor into an ordered list of concrete actions and
//! runs it against a page:
//! - [`workflow`] flattens library steps and inline actions
//! - [`variables`] substitutes `{{name}}` tokens before each action
//! - [`retry`] repeats element resolution with progressively relaxed matching
//! - [`orchestrator`] sequences actions, honours pause/resume/stop and
//!   breakpoints, and builds the [`WorkflowReport`]
//! - [`debug_view`] renders a report as a standalone HTML page

pub mod debug_view;
pub mod diagnostics;
pub mod errors;
pub mod orchestrator;
pub mod report;
pub mod retry;
pub mod state;
pub mod stats;
pub mod variables;
pub mod workflow;

pub use debug_view::render_html;
pub use diagnostics::{capture_diagnostics, classify_failure};
pub use errors::FlowError;
pub use orchestrator::{OrchestratorSettings, RunOutcome, WorkflowOrchestrator};
pub use report::{ActionReportEntry, FailureDiagnostic, MethodTiming, WorkflowReport};
pub use retry::{RetryController, RetryPolicy};
pub use state::{ExecutionState, RunControl, RunStatus};
pub use stats::ResolverStats;
pub use variables::{referenced_names, substitute, substitute_action};
pub use workflow::{ActionLibrary, WorkflowDescriptor, WorkflowStep};
