//! Capture-time element descriptions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// A point in page coordinates, or in viewport percent for relative positions.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned box in page pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Zero-size boxes belong to hidden or detached elements.
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Recorded description of a target element.
///
/// Produced by the recorder at capture time. All fields are optional because
/// older recordings carry only a subset; the resolver uses whatever is present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Locator {
    /// Base64 encoded PNG/JPEG of the element, optionally as a `data:` URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_image: Option<String>,

    /// Visible text of the element
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Absolute position of the element center in pixels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,

    /// Position as percent of the viewport, tolerant of viewport size changes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_position: Option<Point>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,

    /// Text snippets found near the element at capture time
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nearby_text: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
}

impl Locator {
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Some(Point::new(x, y));
        self
    }

    pub fn with_relative_position(mut self, x: f64, y: f64) -> Self {
        self.relative_position = Some(Point::new(x, y));
        self
    }

    pub fn with_reference_image(mut self, image: impl Into<String>) -> Self {
        self.reference_image = Some(image.into());
        self
    }

    pub fn with_bounding_box(mut self, bbox: BoundingBox) -> Self {
        self.bounding_box = Some(bbox);
        self
    }

    /// Trimmed text, if any non-blank text was recorded.
    pub fn text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    pub fn has_reference_image(&self) -> bool {
        self.reference_image
            .as_deref()
            .map(|image| !image.trim().is_empty())
            .unwrap_or(false)
    }

    /// Fill every field that is unset here from `other`.
    ///
    /// Fields already present on `self` always win.
    pub fn merged_with(mut self, other: &Locator) -> Self {
        if self.reference_image.is_none() {
            self.reference_image = other.reference_image.clone();
        }
        if self.text.is_none() {
            self.text = other.text.clone();
        }
        if self.position.is_none() {
            self.position = other.position;
        }
        if self.relative_position.is_none() {
            self.relative_position = other.relative_position;
        }
        if self.bounding_box.is_none() {
            self.bounding_box = other.bounding_box;
        }
        if self.nearby_text.is_empty() {
            self.nearby_text = other.nearby_text.clone();
        }
        if self.captured_at.is_none() {
            self.captured_at = other.captured_at;
        }
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(rel) = self.relative_position {
            let in_range = |v: f64| v.is_finite() && (0.0..=100.0).contains(&v);
            if !in_range(rel.x) || !in_range(rel.y) {
                return Err(CoreError::InvalidLocator(format!(
                    "relative position ({:.2}, {:.2}) outside [0,100]x[0,100]",
                    rel.x, rel.y
                )));
            }
        }
        if let Some(bbox) = self.bounding_box {
            if bbox.width < 0.0 || bbox.height < 0.0 {
                return Err(CoreError::InvalidLocator(
                    "bounding box has negative size".to_string(),
                ));
            }
        }
        Ok(())
    }
}
