//! Run state and the pause/resume/stop handle

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Lifecycle of one workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
    Stopped,
    Failed,
}

impl RunStatus {
    pub fn name(&self) -> &'static str {
        match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Paused => "paused",
            RunStatus::Completed => "completed",
            RunStatus::Stopped => "stopped",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Stopped | RunStatus::Failed
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Mutable state of the current run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionState {
    pub current_index: usize,
    pub status: RunStatus,
    pub paused: bool,
    pub stopped: bool,
    pub breakpoints: BTreeSet<usize>,
    pub bindings: HashMap<String, String>,
    pub started_at: Option<DateTime<Utc>>,
}

struct ControlInner {
    state: Mutex<ExecutionState>,
    cancel: Mutex<CancellationToken>,
    pause_requested: AtomicBool,
    resumed: Notify,
}

/// Cloneable handle controlling a run from outside the run loop
///
/// `stop()` is cooperative: the loop notices it before the next action or
/// while paused; an in-flight page call completes first.
#[derive(Clone)]
pub struct RunControl {
    inner: Arc<ControlInner>,
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}

impl RunControl {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ControlInner {
                state: Mutex::new(ExecutionState::default()),
                cancel: Mutex::new(CancellationToken::new()),
                pause_requested: AtomicBool::new(false),
                resumed: Notify::new(),
            }),
        }
    }

    /// Request a pause before the next action.
    pub fn pause(&self) {
        self.inner.pause_requested.store(true, Ordering::SeqCst);
        self.inner.state.lock().paused = true;
    }

    pub fn resume(&self) {
        self.inner.pause_requested.store(false, Ordering::SeqCst);
        {
            let mut state = self.inner.state.lock();
            state.paused = false;
            if state.status == RunStatus::Paused {
                state.status = RunStatus::Running;
            }
        }
        self.inner.resumed.notify_waiters();
    }

    pub fn stop(&self) {
        self.inner.state.lock().stopped = true;
        self.inner.cancel.lock().cancel();
        self.inner.resumed.notify_waiters();
    }

    pub fn status(&self) -> RunStatus {
        self.inner.state.lock().status
    }

    pub fn current_index(&self) -> usize {
        self.inner.state.lock().current_index
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.cancel.lock().is_cancelled()
    }

    pub fn is_pause_requested(&self) -> bool {
        self.inner.pause_requested.load(Ordering::SeqCst)
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> ExecutionState {
        self.inner.state.lock().clone()
    }

    pub fn set_breakpoints(&self, breakpoints: impl IntoIterator<Item = usize>) {
        self.inner.state.lock().breakpoints = breakpoints.into_iter().collect();
    }

    pub fn add_breakpoint(&self, index: usize) {
        self.inner.state.lock().breakpoints.insert(index);
    }

    pub fn remove_breakpoint(&self, index: usize) {
        self.inner.state.lock().breakpoints.remove(&index);
    }

    pub fn clear_breakpoints(&self) {
        self.inner.state.lock().breakpoints.clear();
    }

    pub fn bindings(&self) -> HashMap<String, String> {
        self.inner.state.lock().bindings.clone()
    }

    pub(crate) fn token(&self) -> CancellationToken {
        self.inner.cancel.lock().clone()
    }

    /// Replace the state for a new run; breakpoints survive, everything else
    /// starts fresh.
    pub(crate) fn begin(&self, bindings: HashMap<String, String>) {
        let mut state = self.inner.state.lock();
        let breakpoints = std::mem::take(&mut state.breakpoints);
        *state = ExecutionState {
            status: RunStatus::Running,
            breakpoints,
            bindings,
            started_at: Some(Utc::now()),
            ..ExecutionState::default()
        };
        *self.inner.cancel.lock() = CancellationToken::new();
        self.inner.pause_requested.store(false, Ordering::SeqCst);
    }

    pub(crate) fn set_index(&self, index: usize) {
        self.inner.state.lock().current_index = index;
    }

    pub(crate) fn set_status(&self, status: RunStatus) {
        self.inner.state.lock().status = status;
    }

    pub(crate) fn bind(&self, name: &str, value: &str) {
        self.inner
            .state
            .lock()
            .bindings
            .insert(name.to_string(), value.to_string());
    }

    pub(crate) fn has_breakpoint(&self, index: usize) -> bool {
        self.inner.state.lock().breakpoints.contains(&index)
    }

    /// Block while a pause is requested. Returns `false` if the run was
    /// stopped meanwhile.
    pub(crate) async fn wait_while_paused(&self, poll: Duration) -> bool {
        let token = self.token();
        loop {
            if token.is_cancelled() {
                return false;
            }
            if !self.is_pause_requested() {
                return true;
            }
            self.set_status(RunStatus::Paused);
            tokio::select! {
                _ = self.inner.resumed.notified() => {}
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(poll) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pause_then_resume_unblocks() {
        let control = RunControl::new();
        control.begin(HashMap::new());
        control.pause();

        let waiter = control.clone();
        let handle =
            tokio::spawn(async move { waiter.wait_while_paused(Duration::from_millis(10)).await });

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(control.status(), RunStatus::Paused);
        control.resume();
        assert!(handle.await.unwrap());
        assert_eq!(control.status(), RunStatus::Running);
    }

    #[tokio::test]
    async fn stop_while_paused_returns_false() {
        let control = RunControl::new();
        control.begin(HashMap::new());
        control.pause();

        let waiter = control.clone();
        let handle =
            tokio::spawn(async move { waiter.wait_while_paused(Duration::from_millis(10)).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        control.stop();
        assert!(!handle.await.unwrap());
        assert!(control.is_stopped());
    }

    #[test]
    fn begin_replaces_state_but_keeps_breakpoints() {
        let control = RunControl::new();
        control.add_breakpoint(2);
        control.begin(HashMap::from([("user".to_string(), "ada".to_string())]));
        control.set_index(4);
        control.stop();

        control.begin(HashMap::new());
        let state = control.snapshot();
        assert_eq!(state.current_index, 0);
        assert_eq!(state.status, RunStatus::Running);
        assert!(!state.stopped);
        assert!(state.bindings.is_empty());
        assert!(state.breakpoints.contains(&2));
        assert!(!control.is_stopped());
    }
}
