//! Resilient replay of recorded browser workflows
//!
//! The engine resolves each recorded action against the live page with a
//! layered strategy chain (structural hint, text plus position, pixel
//! similarity, raw coordinates), retries with progressively relaxed
//! matching, and reports every outcome. The page itself is an injected
//! [`PageAutomation`] capability.
//!
//! ```no_run
//! # use std::{collections::HashMap, sync::Arc};
//! # use replay_engine::{ReplayEngine, config::load_config, WorkflowDescriptor, ActionLibrary};
//! # async fn demo(page: Arc<dyn replay_engine::PageAutomation>) -> replay_engine::Result<()> {
//! let config = load_config(None)?;
//! let engine = ReplayEngine::new(config, page)?;
//! let workflow = WorkflowDescriptor::from_yaml("name: empty")?;
//! let outcome = engine.run(&workflow, &ActionLibrary::new(), HashMap::new()).await;
//! println!("{}", outcome.report.to_json()?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod errors;
pub mod lock;
pub mod telemetry;

pub use engine::ReplayEngine;
pub use errors::{ConfigError, ReplayError, Result};
pub use lock::{InstanceLock, LockOwner};

pub use action_flow::{
    render_html, ActionLibrary, OrchestratorSettings, RetryPolicy, RunControl, RunOutcome,
    RunStatus, WorkflowDescriptor, WorkflowReport, WorkflowStep,
};
pub use action_locator::{ElementResolver, ResolverSettings};
pub use action_primitives::PageAutomation;
pub use replay_core_types::{
    Action, ActionParams, ActionType, ExecutionResult, FailureKind, Locator, ResolutionMethod,
};
