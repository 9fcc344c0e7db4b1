//! Retry controller: progressive relaxation across resolver attempts

use crate::diagnostics::{capture_diagnostics, classify_failure};
use crate::stats::ResolverStats;
use action_locator::{AttemptParams, ElementResolver};
use action_primitives::PageAutomation;
use parking_lot::Mutex;
use replay_core_types::{Action, ExecutionResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{info, warn};

/// How attempts are spaced and how matching loosens between them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub max_retries: u32,
    pub retry_delay_ms: u64,

    /// Position tolerance (viewport percent) at the first attempt
    pub initial_tolerance: f64,
    /// Position tolerance at the final attempt
    pub relaxed_tolerance: f64,

    pub initial_threshold: f64,
    pub relaxed_threshold: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 1000,
            initial_tolerance: 15.0,
            relaxed_tolerance: 30.0,
            initial_threshold: 0.70,
            relaxed_threshold: 0.50,
        }
    }
}

impl RetryPolicy {
    /// Same thresholds, no delay between attempts
    pub fn without_delay(mut self) -> Self {
        self.retry_delay_ms = 0;
        self
    }

    fn progress(&self, attempt: u32) -> f64 {
        if self.max_retries == 0 {
            0.0
        } else {
            attempt.min(self.max_retries) as f64 / self.max_retries as f64
        }
    }

    /// Tolerance widens linearly, reaching the relaxed value at the last attempt.
    pub fn tolerance_for(&self, attempt: u32) -> f64 {
        self.initial_tolerance
            + (self.relaxed_tolerance - self.initial_tolerance) * self.progress(attempt)
    }

    /// Threshold narrows linearly, reaching the relaxed value at the last attempt.
    pub fn threshold_for(&self, attempt: u32) -> f64 {
        self.initial_threshold
            - (self.initial_threshold - self.relaxed_threshold) * self.progress(attempt)
    }

    pub fn params_for(&self, attempt: u32) -> AttemptParams {
        AttemptParams::new(
            attempt,
            self.tolerance_for(attempt),
            self.threshold_for(attempt),
        )
    }
}

/// Wraps one resolver across attempts, with statistics and diagnostics
pub struct RetryController {
    resolver: Arc<dyn ElementResolver>,
    page: Arc<dyn PageAutomation>,
    policy: RetryPolicy,
    stats: Mutex<ResolverStats>,
}

impl RetryController {
    pub fn new(
        resolver: Arc<dyn ElementResolver>,
        page: Arc<dyn PageAutomation>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            resolver,
            page,
            policy,
            stats: Mutex::new(ResolverStats::default()),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> ResolverStats {
        self.stats.lock().clone()
    }

    pub fn reset_stats(&self) {
        *self.stats.lock() = ResolverStats::default();
    }

    /// Run the resolver until it succeeds or attempts run out.
    pub async fn execute(&self, action: &Action) -> ExecutionResult {
        let started = Instant::now();
        let mut last = ExecutionResult::failure("no attempt made");
        let mut retries = 0;

        for attempt in 0..=self.policy.max_retries {
            if attempt > 0 && self.policy.retry_delay_ms > 0 {
                sleep(Duration::from_millis(self.policy.retry_delay_ms)).await;
            }

            let params = self.policy.params_for(attempt);
            let result = self.resolver.resolve(action, &params).await;
            self.stats.lock().record_attempt(&result);

            if result.success {
                self.stats.lock().record_execution(true, attempt);
                if attempt > 0 {
                    info!(
                        action = %action.name,
                        attempt,
                        tolerance = params.tolerance,
                        threshold = params.similarity_threshold,
                        "resolved after retry"
                    );
                }
                return result
                    .with_retries(attempt)
                    .with_elapsed(started.elapsed().as_millis() as u64);
            }

            warn!(
                action = %action.name,
                attempt,
                error = %result.error_message(),
                "attempt failed"
            );
            retries = attempt;
            let give_up = !result.retryable;
            last = result;
            if give_up {
                info!(action = %action.name, attempt, "failure is not retryable");
                break;
            }
        }

        self.stats.lock().record_execution(false, retries);

        let kind = last
            .failure_kind
            .unwrap_or_else(|| classify_failure(last.error_message()));
        let diagnostics = capture_diagnostics(self.page.as_ref()).await;
        warn!(
            action = %action.name,
            retries,
            kind = %kind,
            "all attempts failed"
        );

        last.with_retries(retries)
            .with_failure_kind(kind)
            .with_diagnostics(diagnostics)
            .with_elapsed(started.elapsed().as_millis() as u64)
    }
}
