//! In-memory scripted page for tests
//!
//! Answers the scan scripts from [`crate::scripts`] with canned records and
//! records every call so tests can assert on the interaction sequence.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::{
    errors::ActionError,
    page::PageAutomation,
    scripts::{self, ScriptKind},
    types::{BoundingBox, ElementHandle, ElementRecord, FileInputRecord, PageSnapshot, Viewport},
    WaitPolicy,
};

/// One call made against the fake page.
#[derive(Debug, Clone, PartialEq)]
pub enum PageCall {
    Navigate { url: String, wait: WaitPolicy },
    Hover { x: f64, y: f64 },
    Click { x: f64, y: f64 },
    Type(String),
    PressKey(String),
    Scroll { dx: f64, dy: f64 },
    Screenshot(Option<BoundingBox>),
    Evaluate(Option<ScriptKind>),
    SetFile {
        handle: ElementHandle,
        path: PathBuf,
        existed: bool,
    },
    Wait(u64),
}

/// Capability operation names accepted by [`FakePage::fail`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeOp {
    Navigate,
    Click,
    Type,
    Scroll,
    Screenshot,
    Evaluate,
    SetFile,
}

struct FakeState {
    calls: Vec<PageCall>,
    viewport: Viewport,
    elements: Vec<ElementRecord>,
    selectors: HashMap<String, Vec<ElementRecord>>,
    selector_errors: HashMap<String, String>,
    file_inputs: Vec<FileInputRecord>,
    file_inputs_after: usize,
    file_scans: usize,
    snapshot: PageSnapshot,
    screenshot: Vec<u8>,
    region_screenshots: Vec<(BoundingBox, Vec<u8>)>,
    extracted: HashMap<String, String>,
    failures: HashMap<FakeOp, ActionError>,
}

pub struct FakePage {
    state: Mutex<FakeState>,
}

impl Default for FakePage {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePage {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                calls: Vec::new(),
                viewport: Viewport::new(1000.0, 800.0),
                elements: Vec::new(),
                selectors: HashMap::new(),
                selector_errors: HashMap::new(),
                file_inputs: Vec::new(),
                file_inputs_after: 0,
                file_scans: 0,
                snapshot: PageSnapshot {
                    url: "https://example.test/".to_string(),
                    title: "Example".to_string(),
                    viewport_width: 1000,
                    viewport_height: 800,
                    element_count: 42,
                    visible_text: "Example page".to_string(),
                },
                screenshot: vec![0x89, b'P', b'N', b'G'],
                region_screenshots: Vec::new(),
                extracted: HashMap::new(),
                failures: HashMap::new(),
            }),
        }
    }

    pub fn with_viewport(self, width: f64, height: f64) -> Self {
        self.state.lock().viewport = Viewport::new(width, height);
        self
    }

    /// Elements returned by every text scan, whatever the target.
    pub fn with_elements(self, elements: Vec<ElementRecord>) -> Self {
        self.state.lock().elements = elements;
        self
    }

    pub fn with_selector(self, selector: &str, elements: Vec<ElementRecord>) -> Self {
        self.state
            .lock()
            .selectors
            .insert(selector.to_string(), elements);
        self
    }

    /// The selector query throws `message`, as `querySelectorAll` does for bad syntax.
    pub fn with_invalid_selector(self, selector: &str, message: &str) -> Self {
        self.state
            .lock()
            .selector_errors
            .insert(selector.to_string(), message.to_string());
        self
    }

    pub fn with_file_inputs(self, inputs: Vec<FileInputRecord>) -> Self {
        self.state.lock().file_inputs = inputs;
        self
    }

    /// File inputs only show up after `scans` empty scans.
    pub fn file_inputs_appear_after(self, scans: usize) -> Self {
        self.state.lock().file_inputs_after = scans;
        self
    }

    pub fn with_snapshot(self, snapshot: PageSnapshot) -> Self {
        self.state.lock().snapshot = snapshot;
        self
    }

    pub fn with_screenshot(self, bytes: Vec<u8>) -> Self {
        self.state.lock().screenshot = bytes;
        self
    }

    /// Bytes returned when `region` is captured.
    pub fn with_region_screenshot(self, region: BoundingBox, bytes: Vec<u8>) -> Self {
        self.state.lock().region_screenshots.push((region, bytes));
        self
    }

    pub fn with_extracted(self, selector: &str, text: &str) -> Self {
        self.state
            .lock()
            .extracted
            .insert(selector.to_string(), text.to_string());
        self
    }

    pub fn fail(self, op: FakeOp, error: ActionError) -> Self {
        self.state.lock().failures.insert(op, error);
        self
    }

    /// Replace the elements at runtime, e.g. between two actions.
    pub fn set_elements(&self, elements: Vec<ElementRecord>) {
        self.state.lock().elements = elements;
    }

    pub fn calls(&self) -> Vec<PageCall> {
        self.state.lock().calls.clone()
    }

    pub fn clicks(&self) -> Vec<(f64, f64)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PageCall::Click { x, y } => Some((x, y)),
                _ => None,
            })
            .collect()
    }

    pub fn typed(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PageCall::Type(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PageCall::Navigate { url, .. } => Some(url),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: PageCall, op: Option<FakeOp>) -> Result<(), ActionError> {
        let mut state = self.state.lock();
        state.calls.push(call);
        match op.and_then(|op| state.failures.get(&op)) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn answer(&self, kind: ScriptKind, args: &Value) -> Value {
        let mut state = self.state.lock();
        let viewport = state.viewport;
        match kind {
            ScriptKind::TextScan => json!({
                "viewport": viewport,
                "elements": state.elements,
            }),
            ScriptKind::SelectorQuery => {
                let selector = args["selector"].as_str().unwrap_or_default();
                if let Some(error) = state.selector_errors.get(selector) {
                    return json!({ "viewport": viewport, "elements": [], "error": error });
                }
                let elements = state.selectors.get(selector).cloned().unwrap_or_default();
                json!({ "viewport": viewport, "elements": elements })
            }
            ScriptKind::FileInputScan => {
                state.file_scans += 1;
                if state.file_scans > state.file_inputs_after {
                    json!(state.file_inputs)
                } else {
                    json!([])
                }
            }
            ScriptKind::PageSnapshot => json!(state.snapshot),
            ScriptKind::ExtractText => {
                let selector = args["selector"].as_str().unwrap_or_default();
                json!(state.extracted.get(selector))
            }
        }
    }
}

#[async_trait]
impl PageAutomation for FakePage {
    async fn navigate(&self, url: &str, wait: WaitPolicy) -> Result<(), ActionError> {
        self.record(
            PageCall::Navigate {
                url: url.to_string(),
                wait,
            },
            Some(FakeOp::Navigate),
        )
    }

    async fn hover(&self, x: f64, y: f64) -> Result<(), ActionError> {
        self.record(PageCall::Hover { x, y }, None)
    }

    async fn click(&self, x: f64, y: f64) -> Result<(), ActionError> {
        self.record(PageCall::Click { x, y }, Some(FakeOp::Click))
    }

    async fn type_text(&self, text: &str) -> Result<(), ActionError> {
        self.record(PageCall::Type(text.to_string()), Some(FakeOp::Type))
    }

    async fn press_key(&self, key: &str) -> Result<(), ActionError> {
        self.record(PageCall::PressKey(key.to_string()), Some(FakeOp::Type))
    }

    async fn scroll(&self, dx: f64, dy: f64) -> Result<(), ActionError> {
        self.record(PageCall::Scroll { dx, dy }, Some(FakeOp::Scroll))
    }

    async fn screenshot(&self, region: Option<BoundingBox>) -> Result<Vec<u8>, ActionError> {
        self.record(PageCall::Screenshot(region), Some(FakeOp::Screenshot))?;
        let state = self.state.lock();
        let bytes = region
            .and_then(|region| {
                state
                    .region_screenshots
                    .iter()
                    .find(|(candidate, _)| *candidate == region)
                    .map(|(_, bytes)| bytes.clone())
            })
            .unwrap_or_else(|| state.screenshot.clone());
        Ok(bytes)
    }

    async fn evaluate(&self, script: &str) -> Result<Value, ActionError> {
        let header = scripts::parse_header(script);
        self.record(
            PageCall::Evaluate(header.as_ref().map(|(kind, _)| *kind)),
            Some(FakeOp::Evaluate),
        )?;
        match header {
            Some((kind, args)) => Ok(self.answer(kind, &args)),
            None => Ok(Value::Null),
        }
    }

    async fn set_file(&self, input: &ElementHandle, path: &Path) -> Result<(), ActionError> {
        self.record(
            PageCall::SetFile {
                handle: input.clone(),
                path: path.to_path_buf(),
                existed: path.exists(),
            },
            Some(FakeOp::SetFile),
        )
    }

    async fn wait(&self, ms: u64) -> Result<(), ActionError> {
        self.record(PageCall::Wait(ms), None)
    }
}

/// Visible element record at `(x, y)` with the given size.
pub fn element(handle: &str, text: &str, x: f64, y: f64, width: f64, height: f64) -> ElementRecord {
    ElementRecord {
        handle: ElementHandle::new(handle),
        text: text.to_string(),
        tag: Some("button".to_string()),
        x,
        y,
        width,
        height,
        source: crate::types::RecordSource::Element,
    }
}
