//! Structured run report

use crate::state::RunStatus;
use chrono::{DateTime, Utc};
use replay_core_types::{
    ActionType, DiagnosticBundle, ExecutionResult, FailureKind, ResolutionMethod, RunId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One executed action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionReportEntry {
    pub index: usize,
    pub name: String,
    pub action_type: ActionType,
    pub success: bool,
    pub method: ResolutionMethod,
    pub duration_ms: u64,
    pub retries: u32,
    pub confidence: Option<f64>,
    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,

    /// Viewport before the action (base64 PNG), when screenshots are enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_before: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_after: Option<String>,

    /// Image produced by a screenshot action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture: Option<String>,
}

impl ActionReportEntry {
    pub fn new(index: usize, name: &str, action_type: ActionType, result: &ExecutionResult) -> Self {
        Self {
            index,
            name: name.to_string(),
            action_type,
            success: result.success,
            method: result.method,
            duration_ms: result.elapsed_ms,
            retries: result.retries,
            confidence: result.confidence,
            timestamp: Utc::now(),
            error: result.error.clone(),
            failure_kind: result.failure_kind,
            screenshot_before: None,
            screenshot_after: None,
            capture: None,
        }
    }
}

/// Time spent per resolution method
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodTiming {
    pub count: u64,
    pub total_ms: u64,
}

impl MethodTiming {
    pub fn average_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_ms as f64 / self.count as f64
        }
    }
}

/// Diagnostics attached to a failed action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureDiagnostic {
    pub index: usize,
    pub name: String,
    pub error: String,
    pub failure_kind: Option<FailureKind>,
    pub diagnostics: Option<DiagnosticBundle>,
}

/// Report of one workflow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub run_id: RunId,
    pub workflow_name: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    pub entries: Vec<ActionReportEntry>,
    pub method_timings: BTreeMap<ResolutionMethod, MethodTiming>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,

    /// Percent of entries that succeeded
    pub success_rate: f64,
    pub average_duration_ms: f64,
    pub average_confidence: Option<f64>,
    pub failures: Vec<FailureDiagnostic>,
    pub error_log: Vec<String>,
}

impl WorkflowReport {
    /// Create a new report
    pub fn new(workflow_name: impl Into<String>) -> Self {
        Self {
            run_id: RunId::new(),
            workflow_name: workflow_name.into(),
            status: RunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            duration_ms: 0,
            entries: Vec::new(),
            method_timings: BTreeMap::new(),
            total: 0,
            succeeded: 0,
            failed: 0,
            success_rate: 0.0,
            average_duration_ms: 0.0,
            average_confidence: None,
            failures: Vec::new(),
            error_log: Vec::new(),
        }
    }

    /// Append an entry, updating method timings and the failure list
    pub fn record(&mut self, entry: ActionReportEntry, result: &ExecutionResult) {
        let timing = self.method_timings.entry(entry.method).or_default();
        timing.count += 1;
        timing.total_ms += entry.duration_ms;

        if !entry.success {
            let error = entry.error.clone().unwrap_or_default();
            self.error_log
                .push(format!("[{}] {}: {}", entry.index, entry.name, error));
            self.failures.push(FailureDiagnostic {
                index: entry.index,
                name: entry.name.clone(),
                error,
                failure_kind: entry.failure_kind,
                diagnostics: result.diagnostics.clone(),
            });
        }
        self.entries.push(entry);
    }

    pub fn log_error(&mut self, message: impl Into<String>) {
        self.error_log.push(message.into());
    }

    /// Set the final status and compute the aggregates
    pub fn finish(mut self, status: RunStatus) -> Self {
        let finished_at = Utc::now();
        self.status = status;
        self.duration_ms = (finished_at - self.started_at).num_milliseconds().max(0) as u64;
        self.finished_at = Some(finished_at);

        self.total = self.entries.len();
        self.succeeded = self.entries.iter().filter(|e| e.success).count();
        self.failed = self.total - self.succeeded;

        if self.total > 0 {
            self.success_rate = self.succeeded as f64 / self.total as f64 * 100.0;
            let total_ms: u64 = self.entries.iter().map(|e| e.duration_ms).sum();
            self.average_duration_ms = total_ms as f64 / self.total as f64;
        }

        let confidences: Vec<f64> = self.entries.iter().filter_map(|e| e.confidence).collect();
        if !confidences.is_empty() {
            self.average_confidence =
                Some(confidences.iter().sum::<f64>() / confidences.len() as f64);
        }
        self
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
