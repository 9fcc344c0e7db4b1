//! Core types for locator system

use action_primitives::{
    BoundingBox, ElementHandle, ElementRecord, Point, RecordSource, TempoPlan, Viewport,
};
use replay_core_types::{FailureKind, ResolutionMethod};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Locator strategy enumeration
///
/// Strategies are tried in fallback order:
/// - Structural: literal selector hint, verified against recorded text
/// - Textual: text search narrowed by position, then by pixel similarity
/// - Coordinate: raw replay at the recorded absolute position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocatorStrategy {
    Structural,
    Textual,
    Coordinate,
}

impl LocatorStrategy {
    /// Get strategy name as string
    pub fn name(&self) -> &'static str {
        match self {
            LocatorStrategy::Structural => "structural",
            LocatorStrategy::Textual => "textual",
            LocatorStrategy::Coordinate => "coordinate",
        }
    }

    /// Get all strategies in fallback order
    pub fn fallback_chain() -> Vec<LocatorStrategy> {
        vec![
            LocatorStrategy::Structural,
            LocatorStrategy::Textual,
            LocatorStrategy::Coordinate,
        ]
    }
}

/// Where a candidate was discovered.
pub type CandidateSource = RecordSource;

/// Live element matching a target text
///
/// Ephemeral: only valid until the page changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub handle: ElementHandle,

    /// Normalized visible text
    pub text: String,

    #[serde(default)]
    pub tag: Option<String>,

    /// Element center in viewport pixels
    pub position: Point,

    /// Element center as percent of the viewport
    pub relative_position: Point,

    pub bounding_box: BoundingBox,

    pub source: CandidateSource,
}

impl Candidate {
    /// Build a candidate from a raw scan record.
    pub fn from_record(record: &ElementRecord, viewport: &Viewport) -> Self {
        let bounding_box = record.bounding_box();
        let position = bounding_box.center();
        Self {
            handle: record.handle.clone(),
            text: record.text.clone(),
            tag: record.tag.clone(),
            position,
            relative_position: viewport.to_relative(position),
            bounding_box,
            source: record.source,
        }
    }

    /// Text equality, ignoring case and surrounding whitespace
    pub fn text_equals(&self, other: &str) -> bool {
        self.text.trim().to_lowercase() == other.trim().to_lowercase()
    }
}

/// Per-attempt matching parameters chosen by the retry controller
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttemptParams {
    /// Zero-based attempt index
    pub attempt: u32,

    /// Position tolerance in viewport percent
    pub tolerance: f64,

    /// Minimum visual similarity accepted
    pub similarity_threshold: f64,
}

impl AttemptParams {
    pub fn new(attempt: u32, tolerance: f64, similarity_threshold: f64) -> Self {
        Self {
            attempt,
            tolerance,
            similarity_threshold,
        }
    }
}

impl Default for AttemptParams {
    fn default() -> Self {
        Self::new(0, 15.0, 0.70)
    }
}

/// Element (or raw point) a strategy settled on
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTarget {
    pub strategy: LocatorStrategy,
    pub method: ResolutionMethod,

    /// Point to interact at, in viewport pixels
    pub point: Point,

    pub handle: Option<ElementHandle>,
    pub text: Option<String>,
    pub confidence: f64,
}

impl ResolvedTarget {
    pub fn from_candidate(
        candidate: &Candidate,
        strategy: LocatorStrategy,
        method: ResolutionMethod,
        confidence: f64,
    ) -> Self {
        Self {
            strategy,
            method,
            point: candidate.position,
            handle: Some(candidate.handle.clone()),
            text: Some(candidate.text.clone()),
            confidence,
        }
    }
}

/// Why a strategy produced no target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissKind {
    /// The action carries nothing this strategy can use
    NotApplicable,
    NotFound,
    /// Several candidates and nothing to tell them apart
    Ambiguous,
    TextMismatch,
    PositionMismatch,
    VisualMismatch,
    /// The page rejected the selector hint
    InvalidSelector,
}

impl MissKind {
    /// `None` for misses that say nothing about the page
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            MissKind::NotApplicable => None,
            MissKind::NotFound | MissKind::Ambiguous => Some(FailureKind::ElementNotFound),
            MissKind::TextMismatch => Some(FailureKind::TextMismatch),
            MissKind::PositionMismatch => Some(FailureKind::PositionMismatch),
            MissKind::VisualMismatch => Some(FailureKind::VisualMismatch),
            MissKind::InvalidSelector => Some(FailureKind::SelectorFailed),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Miss {
    pub kind: MissKind,
    pub reason: String,
}

impl fmt::Display for Miss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

/// Result of one strategy within a single attempt
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyOutcome {
    Matched(ResolvedTarget),

    /// Strategy does not apply or found nothing usable
    Miss(Miss),
}

impl StrategyOutcome {
    pub fn miss(kind: MissKind, reason: impl Into<String>) -> Self {
        StrategyOutcome::Miss(Miss {
            kind,
            reason: reason.into(),
        })
    }

    pub fn is_match(&self) -> bool {
        matches!(self, StrategyOutcome::Matched(_))
    }
}

/// Upload behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    /// Extra file input scans after the first one comes back empty
    pub retries: u32,

    /// Delay before retry `k` is `retry_delay_ms * k`
    pub retry_delay_ms: u64,

    /// How long a downloaded remote file is kept after the upload
    pub download_grace_ms: u64,

    pub download_timeout_ms: u64,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            retries: 3,
            retry_delay_ms: 500,
            download_grace_ms: 30_000,
            download_timeout_ms: 30_000,
        }
    }
}

/// Resolver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    /// Jitter and hover delays for interaction
    pub tempo: TempoPlan,

    pub upload: UploadSettings,

    /// Key pressed by a submit action without any locator
    pub submit_key: String,

    pub text_confidence: f64,
    pub exact_text_confidence: f64,
    pub coordinate_confidence: f64,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            tempo: TempoPlan::default(),
            upload: UploadSettings::default(),
            submit_key: "Enter".to_string(),
            text_confidence: 0.9,
            exact_text_confidence: 1.0,
            coordinate_confidence: 0.1,
        }
    }
}

impl ResolverSettings {
    /// No jitter, no delays and a short download grace; for tests.
    pub fn instant() -> Self {
        Self {
            tempo: TempoPlan::instant(),
            upload: UploadSettings {
                retry_delay_ms: 0,
                download_grace_ms: 0,
                ..UploadSettings::default()
            },
            ..Self::default()
        }
    }
}
