//! Execution outcomes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How an action's target was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    /// Literal selector hint, verified against the recorded text
    Structural,

    /// Visible text narrowed by relative position
    Textual,

    /// Pixel similarity against the recorded reference image
    Visual,

    /// Raw replay at the recorded coordinates
    Coordinate,

    /// File set directly on a file input
    Upload,

    /// Executed without element resolution (navigate, wait, scroll, ...)
    Direct,

    /// Nothing worked
    None,
}

impl ResolutionMethod {
    pub fn name(&self) -> &'static str {
        match self {
            ResolutionMethod::Structural => "structural",
            ResolutionMethod::Textual => "textual",
            ResolutionMethod::Visual => "visual",
            ResolutionMethod::Coordinate => "coordinate",
            ResolutionMethod::Upload => "upload",
            ResolutionMethod::Direct => "direct",
            ResolutionMethod::None => "none",
        }
    }
}

impl fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classification of an exhausted failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    ElementNotFound,
    TextMismatch,
    PositionMismatch,
    VisualMismatch,
    SelectorFailed,
    Unknown,
}

impl FailureKind {
    pub fn name(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::ElementNotFound => "element_not_found",
            FailureKind::TextMismatch => "text_mismatch",
            FailureKind::PositionMismatch => "position_mismatch",
            FailureKind::VisualMismatch => "visual_mismatch",
            FailureKind::SelectorFailed => "selector_failed",
            FailureKind::Unknown => "unknown",
        }
    }

    /// Rank used to pick one kind out of several strategy misses; higher
    /// says more about why the target was not reached.
    pub fn specificity(&self) -> u8 {
        match self {
            FailureKind::Timeout => 6,
            FailureKind::VisualMismatch => 5,
            FailureKind::PositionMismatch => 4,
            FailureKind::TextMismatch => 3,
            FailureKind::SelectorFailed => 2,
            FailureKind::ElementNotFound => 1,
            FailureKind::Unknown => 0,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Page state captured at failure time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageSnapshot {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub viewport_width: u32,
    #[serde(default)]
    pub viewport_height: u32,
    #[serde(default)]
    pub element_count: u64,
    /// Visible body text, truncated
    #[serde(default)]
    pub visible_text: String,
}

/// Everything captured after an action exhausted its retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticBundle {
    /// Base64 PNG of the viewport
    pub screenshot: Option<String>,
    pub page: Option<PageSnapshot>,
    /// Capture steps that failed; never replaces the action's own error
    #[serde(default)]
    pub capture_errors: Vec<String>,
    pub captured_at: DateTime<Utc>,
}

impl DiagnosticBundle {
    pub fn empty() -> Self {
        Self {
            screenshot: None,
            page: None,
            capture_errors: Vec::new(),
            captured_at: Utc::now(),
        }
    }
}

/// Outcome of a single action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub method: ResolutionMethod,

    /// 0..1, present when the method produces a meaningful score
    pub confidence: Option<f64>,

    pub elapsed_ms: u64,
    pub retries: u32,
    pub error: Option<String>,
    pub failure_kind: Option<FailureKind>,

    /// False when another attempt cannot change the outcome
    #[serde(default = "retryable_by_default")]
    pub retryable: bool,

    pub diagnostics: Option<DiagnosticBundle>,
}

fn retryable_by_default() -> bool {
    true
}

impl ExecutionResult {
    pub fn success(method: ResolutionMethod, confidence: Option<f64>) -> Self {
        Self {
            success: true,
            method,
            confidence: confidence.map(|c| c.clamp(0.0, 1.0)),
            elapsed_ms: 0,
            retries: 0,
            error: None,
            failure_kind: None,
            retryable: true,
            diagnostics: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            method: ResolutionMethod::None,
            confidence: None,
            elapsed_ms: 0,
            retries: 0,
            error: Some(error.into()),
            failure_kind: None,
            retryable: true,
            diagnostics: None,
        }
    }

    pub fn with_elapsed(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = elapsed_ms;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_failure_kind(mut self, kind: FailureKind) -> Self {
        self.failure_kind = Some(kind);
        self
    }

    pub fn non_retryable(mut self) -> Self {
        self.retryable = false;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: DiagnosticBundle) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or("")
    }
}
