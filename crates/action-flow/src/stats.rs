//! Running resolver statistics

use replay_core_types::{ExecutionResult, ResolutionMethod};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counters accumulated by a retry controller
///
/// Resetting replaces the whole value; there are no partially reset fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolverStats {
    /// Resolver invocations, one per attempt
    pub total_attempts: u64,
    pub successful_attempts: u64,
    pub failed_attempts: u64,

    /// Actions taken through the controller, however many attempts each
    pub total_executions: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,

    /// Attempts by the method that produced them
    pub by_method: BTreeMap<ResolutionMethod, u64>,

    /// Executions by number of retries used
    pub retries_histogram: BTreeMap<u32, u64>,

    pub min_elapsed_ms: Option<u64>,
    pub max_elapsed_ms: Option<u64>,

    /// Incremental mean over attempts
    pub avg_elapsed_ms: f64,
}

impl ResolverStats {
    pub fn record_attempt(&mut self, result: &ExecutionResult) {
        self.total_attempts += 1;
        if result.success {
            self.successful_attempts += 1;
        } else {
            self.failed_attempts += 1;
        }
        *self.by_method.entry(result.method).or_insert(0) += 1;

        let elapsed = result.elapsed_ms;
        self.min_elapsed_ms = Some(self.min_elapsed_ms.map_or(elapsed, |m| m.min(elapsed)));
        self.max_elapsed_ms = Some(self.max_elapsed_ms.map_or(elapsed, |m| m.max(elapsed)));
        let n = self.total_attempts as f64;
        self.avg_elapsed_ms += (elapsed as f64 - self.avg_elapsed_ms) / n;
    }

    pub fn record_execution(&mut self, success: bool, retries: u32) {
        self.total_executions += 1;
        if success {
            self.successful_executions += 1;
        } else {
            self.failed_executions += 1;
        }
        *self.retries_histogram.entry(retries).or_insert(0) += 1;
    }

    /// Share of successful executions, in percent
    pub fn success_rate(&self) -> f64 {
        if self.total_executions == 0 {
            0.0
        } else {
            self.successful_executions as f64 / self.total_executions as f64 * 100.0
        }
    }
}
