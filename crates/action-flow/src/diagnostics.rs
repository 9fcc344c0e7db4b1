//! Failure diagnostics and classification

use action_primitives::{evaluate_as, scripts, PageAutomation, PageSnapshot};
use chrono::Utc;
use perceiver_visual::encode_base64;
use replay_core_types::{DiagnosticBundle, FailureKind};
use tracing::debug;

/// Keywords per failure kind, checked in order; the first hit wins.
const CLASSIFICATION: &[(FailureKind, &[&str])] = &[
    (FailureKind::Timeout, &["timeout", "timed out"]),
    (FailureKind::VisualMismatch, &["visual mismatch", "similarity"]),
    (FailureKind::PositionMismatch, &["position mismatch", "tolerance"]),
    (FailureKind::TextMismatch, &["text mismatch"]),
    (
        FailureKind::SelectorFailed,
        &["selector", "syntaxerror", "queryselector"],
    ),
    (
        FailureKind::ElementNotFound,
        &["not found", "no element", "no visible element", "no file input"],
    ),
];

/// Classify a failure message by case-insensitive keyword match.
///
/// Fallback for results that arrive without a kind. Single-quoted segments
/// hold recorded text, selectors and names, and are skipped.
pub fn classify_failure(message: &str) -> FailureKind {
    let lower = without_quoted(message).to_lowercase();
    CLASSIFICATION
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(kind, _)| *kind)
        .unwrap_or(FailureKind::Unknown)
}

fn without_quoted(message: &str) -> String {
    let mut quoted = false;
    message
        .chars()
        .filter(|&c| {
            if c == '\'' {
                quoted = !quoted;
                return false;
            }
            !quoted
        })
        .collect()
}

/// Capture a viewport screenshot and a page snapshot.
///
/// Capture failures are recorded in the bundle, never raised.
pub async fn capture_diagnostics(page: &dyn PageAutomation) -> DiagnosticBundle {
    let mut bundle = DiagnosticBundle::empty();

    match page.screenshot(None).await {
        Ok(bytes) => bundle.screenshot = Some(encode_base64(&bytes)),
        Err(err) => {
            debug!(error = %err, "diagnostic screenshot failed");
            bundle.capture_errors.push(format!("screenshot: {}", err));
        }
    }

    match evaluate_as::<PageSnapshot>(page, &scripts::page_snapshot()).await {
        Ok(mut snapshot) => {
            if snapshot.visible_text.chars().count() > scripts::SNAPSHOT_TEXT_LIMIT {
                snapshot.visible_text = snapshot
                    .visible_text
                    .chars()
                    .take(scripts::SNAPSHOT_TEXT_LIMIT)
                    .collect();
            }
            bundle.page = Some(snapshot);
        }
        Err(err) => {
            debug!(error = %err, "page snapshot failed");
            bundle.capture_errors.push(format!("page snapshot: {}", err));
        }
    }

    bundle.captured_at = Utc::now();
    bundle
}
