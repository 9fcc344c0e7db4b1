//! Data exchanged with the page automation capability

use serde::{Deserialize, Serialize};
use std::fmt;

pub use replay_core_types::{BoundingBox, PageSnapshot, Point};

/// Attribute the scan scripts stamp on every element they report.
pub const HANDLE_ATTRIBUTE: &str = "data-replay-handle";

/// Opaque reference to a live element, valid until the next navigation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementHandle(pub String);

impl ElementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// CSS selector addressing the stamped element.
    pub fn selector(&self) -> String {
        format!("[{}=\"{}\"]", HANDLE_ATTRIBUTE, self.0)
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which scan discovered an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    /// Parent of a matching text node
    TextNode,

    /// Interactive or composite element whose full text matches
    Element,

    /// Result of a selector query
    Selector,
}

/// Raw element as reported by a scan script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementRecord {
    pub handle: ElementHandle,

    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub tag: Option<String>,

    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,

    #[serde(default = "default_source")]
    pub source: RecordSource,
}

fn default_source() -> RecordSource {
    RecordSource::Element
}

impl ElementRecord {
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::new(self.x, self.y, self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Convert an absolute point to viewport percent.
    pub fn to_relative(&self, point: Point) -> Point {
        let pct = |value: f64, extent: f64| {
            if extent > 0.0 {
                (value * 100.0 / extent).clamp(0.0, 100.0)
            } else {
                0.0
            }
        };
        Point::new(pct(point.x, self.width), pct(point.y, self.height))
    }
}

/// Output of a DOM scan script.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScanResult {
    #[serde(default)]
    pub viewport: Viewport,

    #[serde(default)]
    pub elements: Vec<ElementRecord>,

    /// Set when the page rejected the query, e.g. a malformed selector
    #[serde(default)]
    pub error: Option<String>,
}

/// A file input found in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInputRecord {
    pub handle: ElementHandle,

    /// Raw `accept` attribute, e.g. `image/*,.pdf`
    #[serde(default)]
    pub accept: Option<String>,

    #[serde(default)]
    pub multiple: bool,
}
